use yew::prelude::*;

#[derive(Clone, PartialEq, Properties)]
pub struct CommentFormProps {
    pub placeholder: AttrValue,
    pub button: AttrValue,
    pub on_submit: Callback<String>,
}

#[function_component(CommentForm)]
pub fn comment_form(p: &CommentFormProps) -> Html {
    let text_ref = use_node_ref();
    let on_click = {
        let text_ref = text_ref.clone();
        let on_submit = p.on_submit.clone();
        Callback::from(move |_| {
            let elt = text_ref
                .cast::<web_sys::HtmlTextAreaElement>()
                .expect("comment box is not a textarea");
            let value = elt.value();
            if value.trim().is_empty() {
                return;
            }
            on_submit.emit(value);
            elt.set_value("");
        })
    };
    html! {
        <div class="comment-form mb-3">
            <textarea
                ref={ text_ref }
                class="form-control mb-2"
                rows="3"
                placeholder={ p.placeholder.clone() }
                aria-label={ p.placeholder.clone() }
            />
            <button type="button" class="btn btn-primary" onclick={ on_click }>
                { p.button.clone() }
            </button>
        </div>
    }
}
