use hypertext::prelude::*;

/// A row of buttons. Entries are `(href, label)`; a link starting with
/// `post:` is rendered as a small form so that it submits a POST instead.
pub struct Actions<'r> {
    pub options: &'r [(&'r str, &'r str)],
}

impl<'r> Renderable for Actions<'r> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            div class="d-flex gap-2 mt-3 mb-3" {
                @for (link, text) in self.options {
                    @if let Some(action) = link.strip_prefix("post:") {
                        form method="post" action=(action) {
                            button type="submit" class="btn btn-outline-secondary" {
                                (text)
                            }
                        }
                    } @else {
                        a class="btn btn-primary" href=(link) {
                            (text)
                        }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}
