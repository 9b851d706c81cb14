use tribune_client::api::{Comment, CommentId, UserId};
use yew::prelude::*;

use crate::ui;

#[derive(Clone, PartialEq, Properties)]
pub struct CommentItemProps {
    pub comment: Comment,
    pub viewer: Option<UserId>,
    /// False for reply items, which cannot be replied to in turn
    pub allow_replies: bool,
    pub expanded: bool,
    pub replies: Option<Vec<Comment>>,
    pub on_like: Callback<CommentId>,
    pub on_dislike: Callback<CommentId>,
    pub on_toggle_replies: Callback<CommentId>,
    pub on_reply: Callback<(CommentId, String)>,
    pub on_edit: Callback<(CommentId, String)>,
    pub on_delete: Callback<CommentId>,
}

#[function_component(CommentItem)]
pub fn comment_item(p: &CommentItemProps) -> Html {
    let c = &p.comment;
    let id = c.id;
    let is_own = p.viewer == Some(c.author.id);
    let edit = use_state(|| None::<String>);

    let own_controls = is_own.then(|| {
        let on_edit_click = {
            let edit = edit.clone();
            let content = c.content.clone();
            Callback::from(move |_| edit.set(Some(content.clone())))
        };
        let on_delete_click = {
            let on_delete = p.on_delete.clone();
            Callback::from(move |_| {
                let confirmed = web_sys::window()
                    .map(|w| w.confirm_with_message("Delete this comment?").unwrap_or(false))
                    .unwrap_or(false);
                if confirmed {
                    on_delete.emit(id);
                }
            })
        };
        html! {
            <span class="ms-2">
                <button type="button" class="btn btn-sm btn-link" onclick={ on_edit_click }>
                    { "Edit" }
                </button>
                <button
                    type="button"
                    class="btn btn-sm btn-link text-danger"
                    onclick={ on_delete_click }
                >
                    { "Delete" }
                </button>
            </span>
        }
    });

    let body = match (*edit).clone() {
        None => html! { <p class="mb-1">{ &c.content }</p> },
        Some(draft) => {
            let on_draft_change = {
                let edit = edit.clone();
                Callback::from(move |e: web_sys::Event| {
                    let input: web_sys::HtmlTextAreaElement = e.target_unchecked_into();
                    edit.set(Some(input.value()));
                })
            };
            let on_save = {
                let edit = edit.clone();
                let on_edit = p.on_edit.clone();
                Callback::from(move |_| {
                    if let Some(draft) = (*edit).clone() {
                        on_edit.emit((id, draft));
                        edit.set(None);
                    }
                })
            };
            let on_cancel = {
                let edit = edit.clone();
                Callback::from(move |_| edit.set(None))
            };
            html! {
                <div class="mb-1">
                    <textarea
                        class="form-control mb-1"
                        rows="3"
                        value={ draft }
                        onchange={ on_draft_change }
                    />
                    <button type="button" class="btn btn-sm btn-primary me-1" onclick={ on_save }>
                        { "Save" }
                    </button>
                    <button type="button" class="btn btn-sm btn-secondary" onclick={ on_cancel }>
                        { "Cancel" }
                    </button>
                </div>
            }
        }
    };

    let like_class = match c.has_liked {
        true => "btn-primary",
        false => "btn-outline-primary",
    };
    let dislike_class = match c.has_disliked {
        true => "btn-danger",
        false => "btn-outline-danger",
    };
    let edited_marker =
        (c.updated_at > c.created_at).then(|| html! { <span class="ms-1">{ "(edited)" }</span> });

    let replies_toggle = p.allow_replies.then(|| {
        html! {
            <button
                type="button"
                class="btn btn-sm btn-link"
                onclick={ p.on_toggle_replies.reform(move |_| id) }
            >
                { match p.expanded {
                    true => format!("Hide replies ({})", c.reply_count),
                    false => format!("Replies ({})", c.reply_count),
                } }
            </button>
        }
    });

    let replies_section = (p.allow_replies && p.expanded).then(|| {
        let reply_items = match &p.replies {
            None => html! { <div class="text-muted">{ "Loading replies..." }</div> },
            Some(replies) => html! {
                <ul class="list-group">
                    { for replies.iter().map(|r| html! {
                        <ui::CommentItem
                            key={ r.id.0.to_string() }
                            comment={ r.clone() }
                            viewer={ p.viewer }
                            allow_replies={ false }
                            expanded={ false }
                            replies={ None::<Vec<Comment>> }
                            on_like={ p.on_like.clone() }
                            on_dislike={ p.on_dislike.clone() }
                            on_toggle_replies={ p.on_toggle_replies.clone() }
                            on_reply={ p.on_reply.clone() }
                            on_edit={ p.on_edit.clone() }
                            on_delete={ p.on_delete.clone() }
                        />
                    }) }
                </ul>
            },
        };
        html! {
            <div class="replies ms-4 mt-2">
                { reply_items }
                <ui::CommentForm
                    placeholder="Write a reply..."
                    button="Reply"
                    on_submit={ p.on_reply.reform(move |text| (id, text)) }
                />
            </div>
        }
    });

    html! {
        <li class="list-group-item">
            <div class="d-flex align-items-center mb-1">
                <strong>{ &c.author.username }</strong>
                <span class="text-muted ms-2">
                    { c.created_at.format("%Y-%m-%d %H:%M").to_string() }
                </span>
                { for edited_marker }
                { for own_controls }
            </div>
            { body }
            <div class="d-flex align-items-center">
                <button
                    type="button"
                    class={ classes!("btn", "btn-sm", "me-1", like_class) }
                    aria-label="Like"
                    onclick={ p.on_like.reform(move |_| id) }
                >
                    { format!("▲ {}", c.like_count) }
                </button>
                <button
                    type="button"
                    class={ classes!("btn", "btn-sm", dislike_class) }
                    aria-label="Dislike"
                    onclick={ p.on_dislike.reform(move |_| id) }
                >
                    { format!("▼ {}", c.dislike_count) }
                </button>
                { for replies_toggle }
            </div>
            { for replies_section }
        </li>
    }
}
