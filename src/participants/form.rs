use hypertext::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    participants::{COMPETITIONS, Participant, Role, Section},
    validation::{FieldErrors, is_valid_person_name},
    widgets::alert::FieldError,
};

/// The add/edit participant form, as submitted. Competitions arrive as
/// repeated `competitions` keys.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ParticipantForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub competitions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidParticipant {
    pub name: String,
    pub role: Role,
    /// Always `None` for teachers.
    pub section: Option<Section>,
    /// Catalog order, without duplicates.
    pub competitions: Vec<String>,
}

impl ValidParticipant {
    pub fn competitions_json(&self) -> String {
        serde_json::to_string(&self.competitions)
            .unwrap_or_else(|_| "[]".to_string())
    }
}

impl ParticipantForm {
    pub fn blank() -> Self {
        Self {
            role: Role::Student.as_str().to_string(),
            section: Some(Section::Nursery.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn from_participant(participant: &Participant) -> Self {
        Self {
            name: participant.name.clone(),
            role: participant.role.clone(),
            section: participant.section.clone(),
            competitions: participant.competitions(),
        }
    }

    pub fn validate(&self) -> Result<ValidParticipant, FieldErrors> {
        let mut errors = FieldErrors::new();

        if let Err(e) = is_valid_person_name(&self.name) {
            errors.insert("name", e);
        }

        let role = match self.role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                errors.insert("role", "Please choose a role".to_string());
                None
            }
        };

        let section = match role {
            Some(Role::Student) => {
                match self
                    .section
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(str::parse::<Section>)
                {
                    Some(Ok(section)) => Some(section),
                    Some(Err(_)) | None => {
                        errors.insert(
                            "section",
                            "Students must be assigned a section".to_string(),
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        if let Some(unknown) = self
            .competitions
            .iter()
            .find(|c| !COMPETITIONS.contains(&c.as_str()))
        {
            errors.insert(
                "competitions",
                format!("{unknown:?} is not one of the competitions"),
            );
        }
        let competitions = COMPETITIONS
            .iter()
            .filter(|c| self.competitions.iter().any(|chosen| chosen == *c))
            .map(|c| c.to_string())
            .collect();

        match (role, errors.is_empty()) {
            (Some(role), true) => Ok(ValidParticipant {
                name: self.name.trim().to_string(),
                role,
                section,
                competitions,
            }),
            _ => Err(errors),
        }
    }
}

/// Renders the participant form, pre-filled with `values`.
pub struct ParticipantFormView<'r> {
    pub action: &'r str,
    pub title: &'r str,
    pub submit_label: &'r str,
    pub values: &'r ParticipantForm,
    pub errors: &'r FieldErrors,
}

impl Renderable for ParticipantFormView<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        let section = self.values.section.as_deref().unwrap_or("");
        maud! {
            form method="post" action=(self.action) class="card card-body mb-4" {
                h2 class="h4 mb-3" { (self.title) }
                @if let Some(msg) = self.errors.get("code") {
                    div class="alert alert-danger" role="alert" { (msg) }
                }
                div class="mb-3" {
                    label for="name" class="form-label" { "Participant name" }
                    input type="text"
                        class="form-control"
                        id="name"
                        name="name"
                        value=(&self.values.name)
                        required
                        placeholder="Enter participant's name";
                    FieldError msg=(self.errors.get("name"));
                }
                div class="row" {
                    div class="col-md-6 mb-3" {
                        label for="role" class="form-label" { "Role" }
                        select class="form-select" id="role" name="role" {
                            @for role in Role::ALL {
                                option
                                    value=(role.as_str())
                                    selected[self.values.role == role.as_str()] {
                                    (role.as_str())
                                }
                            }
                        }
                        FieldError msg=(self.errors.get("role"));
                    }
                    div class="col-md-6 mb-3" {
                        label for="section" class="form-label" { "Section" }
                        select class="form-select" id="section" name="section" {
                            @for s in Section::ALL {
                                option
                                    value=(s.as_str())
                                    selected[section == s.as_str()] {
                                    (s.as_str())
                                }
                            }
                        }
                        div class="form-text" { "Only used for students." }
                        FieldError msg=(self.errors.get("section"));
                    }
                }
                fieldset class="mb-3" {
                    legend class="form-label fs-6" { "Competitions" }
                    @for (i, competition) in COMPETITIONS.iter().enumerate() {
                        @let id = format!("competition-{i}");
                        div class="form-check" {
                            input type="checkbox"
                                class="form-check-input"
                                id=(&id)
                                name="competitions"
                                value=(*competition)
                                checked[self.values.competitions.iter().any(|c| c.as_str() == *competition)];
                            label class="form-check-label" for=(&id) {
                                (*competition)
                            }
                        }
                    }
                    FieldError msg=(self.errors.get("competitions"));
                }
                button type="submit" class="btn btn-primary" { (self.submit_label) }
            }
        }
        .render_to(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, role: &str, section: Option<&str>, comps: &[&str]) -> ParticipantForm {
        ParticipantForm {
            name: name.to_string(),
            role: role.to_string(),
            section: section.map(str::to_string),
            competitions: comps.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn teacher_section_is_dropped() {
        let valid = form(" Mary ", "teacher", Some("junior"), &["quiz"])
            .validate()
            .unwrap();
        assert_eq!(valid.name, "Mary");
        assert_eq!(valid.role, Role::Teacher);
        assert_eq!(valid.section, None);
    }

    #[test]
    fn students_need_a_section() {
        let errors = form("John", "student", Some(""), &[]).validate().unwrap_err();
        assert!(errors.contains_key("section"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn competitions_are_deduplicated_in_catalog_order() {
        let valid = form("John", "student", Some("primary"), &["quiz", "memory verse", "quiz"])
            .validate()
            .unwrap();
        assert_eq!(valid.competitions, vec!["memory verse", "quiz"]);
        assert_eq!(valid.competitions_json(), r#"["memory verse","quiz"]"#);
    }

    #[test]
    fn every_bad_field_is_reported() {
        let errors = form("", "pastor", None, &["chess"]).validate().unwrap_err();
        let fields: Vec<_> = errors.keys().copied().collect();
        assert_eq!(fields, vec!["name", "role", "competitions"]);
    }
}
