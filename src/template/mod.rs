//! Templating code.
//!
//! This defines the [`Page`] item, which wraps the body of every page in the
//! portal with the document head and the navigation bar.

use hypertext::prelude::*;

use crate::{auth::SecretarySession, members::Member};

/// Who is looking at the page. Only used to decide what the navigation bar
/// shows.
#[derive(Default)]
enum Viewer {
    #[default]
    Anonymous,
    Member(String),
    Secretary { name: String, church: String },
    Organizer,
}

pub struct Page<R: Renderable> {
    body: Option<R>,
    viewer: Viewer,
}

impl<R: Renderable> Page<R> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn body(mut self, body: R) -> Self {
        self.body = Some(body);
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.viewer = Viewer::Member(member.name);
        self
    }

    pub fn member_opt(self, member: Option<Member>) -> Self {
        match member {
            Some(member) => self.member(member),
            None => self,
        }
    }

    pub fn secretary(mut self, session: &SecretarySession) -> Self {
        self.viewer = Viewer::Secretary {
            name: session.name.clone(),
            church: session.church_name.clone(),
        };
        self
    }

    pub fn organizer(mut self) -> Self {
        self.viewer = Viewer::Organizer;
        self
    }
}

impl<R: Renderable> Renderable for Page<R> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            html {
                head {
                    title { "Church Registration" }
                    meta charset="utf-8";
                    meta
                        name="viewport"
                        content="width=device-width, initial-scale=1";
                    link
                        href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css"
                        rel="stylesheet"
                        crossorigin="anonymous";
                    script src="https://cdn.jsdelivr.net/npm/htmx.org@2.0.7/dist/htmx.min.js" integrity="sha384-ZBXiYtYQ6hJ2Y0ZNoYuI+Nq5MqWBr+chMrS/RkXpNzQCApHEhOt2aY8EJgqwHLkJ" crossorigin="anonymous" {
                    }
                }
                body class="d-flex flex-column vh-100 bg-light" {
                    nav class="navbar navbar-expand"
                        style="background-color: #3b2a6b;"
                        data-bs-theme="dark" {
                        div class="container-fluid" {
                            a class="navbar-brand text-white" href="/" {
                                "Church Registration"
                            }
                            ul class="navbar-nav ms-auto" style="gap: 1rem;" {
                                @match &self.viewer {
                                    Viewer::Anonymous => {
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/secretary-login" {
                                                "Secretary"
                                            }
                                        }
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/organizer-login" {
                                                "Organizer"
                                            }
                                        }
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/login" {
                                                "Login"
                                            }
                                        }
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/register" {
                                                "Register"
                                            }
                                        }
                                    }
                                    Viewer::Member(name) => {
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/dashboard" {
                                                (name)
                                            }
                                        }
                                    }
                                    Viewer::Secretary { name, church } => {
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/secretary/dashboard" {
                                                (name) " · " (church)
                                            }
                                        }
                                        li class="nav-item" {
                                            form method="post" action="/secretary/logout" {
                                                button type="submit" class="btn btn-link nav-link text-white" {
                                                    "Log out"
                                                }
                                            }
                                        }
                                    }
                                    Viewer::Organizer => {
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/organizer/dashboard" {
                                                "Organizer dashboard"
                                            }
                                        }
                                        li class="nav-item" {
                                            form method="post" action="/organizer/logout" {
                                                button type="submit" class="btn btn-link nav-link text-white" {
                                                    "Log out"
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                    div class="flex-grow-1" {
                        @if let Some(body) = &self.body {
                            (body)
                        }
                    }
                }
            }
        }.render_to(buffer)
    }
}

impl<R: Renderable> Default for Page<R> {
    fn default() -> Self {
        Self {
            body: Default::default(),
            viewer: Default::default(),
        }
    }
}
