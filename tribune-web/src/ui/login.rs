use tribune_client::api::LoginRequest;
use yew::prelude::*;

#[derive(Clone, PartialEq, Properties)]
pub struct LoginProps {
    pub error: Option<String>,
    pub on_submit: Callback<LoginRequest>,
    pub on_register: Callback<()>,
}

pub struct Login {
    email: String,
    password: String,
}

pub enum LoginMsg {
    EmailChanged(String),
    PasswordChanged(String),
    SubmitClicked,
}

impl Component for Login {
    type Message = LoginMsg;
    type Properties = LoginProps;

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            email: String::new(),
            password: String::new(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            LoginMsg::EmailChanged(e) => self.email = e,
            LoginMsg::PasswordChanged(p) => self.password = p,
            LoginMsg::SubmitClicked => {
                ctx.props().on_submit.emit(LoginRequest {
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
                    LoginMsg::$msg(input.value())
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
                <h1>{ "Log in" }</h1>
            </div>
            { for error }
            <form class="login-form">
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
                    onclick={ ctx.link().callback(|_| LoginMsg::SubmitClicked) }
                >
                    { "Log in" }
                </button>
                <button
                    type="button"
                    class="btn btn-link"
                    onclick={ ctx.props().on_register.reform(|_| ()) }
                >
                    { "Create an account" }
                </button>
            </form>
        </>}
    }
}
