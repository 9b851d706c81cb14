use tribune_client::api::RegisterRequest;
use yew::prelude::*;

#[derive(Clone, PartialEq, Properties)]
pub struct RegisterProps {
    pub error: Option<String>,
    pub on_submit: Callback<RegisterRequest>,
    pub on_login: Callback<()>,
}

pub struct Register {
    username: String,
    email: String,
    password: String,
}

pub enum RegisterMsg {
    UsernameChanged(String),
    EmailChanged(String),
    PasswordChanged(String),
    SubmitClicked,
}

impl Component for Register {
    type Message = RegisterMsg;
    type Properties = RegisterProps;

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            password: String::new(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            RegisterMsg::UsernameChanged(u) => self.username = u,
            RegisterMsg::EmailChanged(e) => self.email = e,
            RegisterMsg::PasswordChanged(p) => self.password = p,
            RegisterMsg::SubmitClicked => {
                ctx.props().on_submit.emit(RegisterRequest {
                    username: self.username.clone(),
                    email: self.email.clone(),
                    password: self.password.clone(),
                });
                return false;
            }
        }
        true
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        macro_rules! callback_for {
            ($msg:ident) => {
                ctx.link().callback(|e: web_sys::Event| {
                    let input: web_sys::HtmlInputElement = e.target_unchecked_into();
                    RegisterMsg::$msg(input.value())
                })
            };
        }
        let error = ctx.props().error.as_ref().map(|e| {
            html! {
                <div class="alert alert-danger" role="alert">{ e }</div>
            }
        });
        html! {<>
            <div class="text-center my-4">
                <h1>{ "Create an account" }</h1>
            </div>
            { for error }
            <form class="login-form">
                <div class="input-group mb-3">
                    <label class="input-group-text col-xl-1" for="username">{ "Username" }</label>
                    <input
                        type="text"
                        class="form-control form-control-lg"
                        id="username"
                        placeholder="username"
                        value={ self.username.clone() }
                        onchange={ callback_for!(UsernameChanged) }
                    />
                </div>
                <div class="input-group mb-3">
                    <label class="input-group-text col-xl-1" for="email">{ "Email" }</label>
                    <input
                        type="email"
                        class="form-control form-control-lg"
                        id="email"
                        placeholder="you@example.org"
                        value={ self.email.clone() }
                        onchange={ callback_for!(EmailChanged) }
                    />
                </div>
                <div class="input-group mb-3">
                    <label class="input-group-text col-xl-1" for="password">{ "Password" }</label>
                    <input
                        type="password"
                        class="form-control form-control-lg"
                        id="password"
                        value={ self.password.clone() }
                        onchange={ callback_for!(PasswordChanged) }
                    />
                </div>
                <button
                    type="submit"
                    class="btn btn-primary"
                    onclick={ ctx.link().callback(|_| RegisterMsg::SubmitClicked) }
                >
                    { "Register" }
                </button>
                <button
                    type="button"
                    class="btn btn-link"
                    onclick={ ctx.props().on_login.reform(|_| ()) }
                >
                    { "Back to login" }
                </button>
            </form>
        </>}
    }
}
