use hypertext::prelude::*;

pub struct ErrorAlert<S> {
    pub msg: S,
}

impl<S: ToString> Renderable for ErrorAlert<S> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud!({
            div class="alert alert-danger" role="alert" {
                (self.msg.to_string())
            }
        })
        .render_to(buffer);
    }
}

pub struct InfoAlert<S> {
    pub msg: S,
}

impl<S: ToString> Renderable for InfoAlert<S> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud!({
            div class="alert alert-info" role="status" {
                (self.msg.to_string())
            }
        })
        .render_to(buffer);
    }
}

/// Inline message shown beneath a form input.
pub struct FieldError<'r> {
    pub msg: Option<&'r String>,
}

impl Renderable for FieldError<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud!({
            @if let Some(msg) = self.msg {
                div class="invalid-feedback d-block" {
                    (msg)
                }
            }
        })
        .render_to(buffer);
    }
}
