mod app;
pub use app::{App, AppMsg, ConnState};

mod comment_form;
pub use comment_form::CommentForm;

mod comment_item;
pub use comment_item::CommentItem;

mod comment_list;
pub use comment_list::CommentList;

mod login;
pub use login::Login;

mod offline_banner;
pub use offline_banner::OfflineBanner;

mod register;
pub use register::Register;
