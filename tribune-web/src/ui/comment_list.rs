use std::collections::{HashMap, HashSet};

use tribune_client::api::{Comment, CommentId, UserId};
use yew::prelude::*;

use crate::ui;

#[derive(Clone, PartialEq, Properties)]
pub struct CommentListProps {
    pub comments: Vec<Comment>,
    pub viewer: Option<UserId>,
    pub replies: HashMap<CommentId, Vec<Comment>>,
    pub expanded: HashSet<CommentId>,
    pub on_like: Callback<CommentId>,
    pub on_dislike: Callback<CommentId>,
    pub on_toggle_replies: Callback<CommentId>,
    pub on_reply: Callback<(CommentId, String)>,
    pub on_edit: Callback<(CommentId, String)>,
    pub on_delete: Callback<CommentId>,
}

#[function_component(CommentList)]
pub fn comment_list(p: &CommentListProps) -> Html {
    if p.comments.is_empty() {
        return html! {
            <div class="text-muted text-center py-5">{ "No comments yet." }</div>
        };
    }
    html! {
        <ul class="list-group">
            { for p.comments.iter().map(|c| html! {
                <ui::CommentItem
                    key={ c.id.0.to_string() }
                    comment={ c.clone() }
                    viewer={ p.viewer }
                    allow_replies={ true }
                    expanded={ p.expanded.contains(&c.id) }
                    replies={ p.replies.get(&c.id).cloned() }
                    on_like={ p.on_like.clone() }
                    on_dislike={ p.on_dislike.clone() }
                    on_toggle_replies={ p.on_toggle_replies.clone() }
                    on_reply={ p.on_reply.clone() }
                    on_edit={ p.on_edit.clone() }
                    on_delete={ p.on_delete.clone() }
                />
            }) }
        </ul>
    }
}
