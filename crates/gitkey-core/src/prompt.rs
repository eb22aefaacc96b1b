//! Operator interaction.
//!
//! Prompts are described by [`PromptField`]s and their answers land in a
//! [`RecordForm`] through an explicit key match.

use zeroize::Zeroizing;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Domain,
    Name,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptField {
    pub key: FieldKey,
    pub label: String,
    pub default: Option<String>,
}

impl PromptField {
    pub fn new(key: FieldKey, label: impl Into<String>, default: Option<String>) -> Self {
        Self {
            key,
            label: label.into(),
            default,
        }
    }
}

pub trait Prompter {
    /// Reads one line. Implementations return the field default for blank input.
    fn ask(&mut self, field: &PromptField) -> Result<String>;

    /// Reads a secret without echo.
    fn ask_secret(&mut self, label: &str) -> Result<Zeroizing<String>>;

    /// Shows a message while a flow is still running.
    fn notice(&mut self, message: &str);
}

/// Answers collected while creating a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordForm {
    pub domain: String,
    pub name: String,
    pub email: String,
}

impl RecordForm {
    fn slot(&mut self, key: FieldKey) -> &mut String {
        match key {
            FieldKey::Domain => &mut self.domain,
            FieldKey::Name => &mut self.name,
            FieldKey::Email => &mut self.email,
        }
    }

    pub fn assign(&mut self, key: FieldKey, value: String) {
        *self.slot(key) = value.trim().to_string();
    }

    /// Asks every field in order, storing each answer under its key.
    pub fn fill<P: Prompter + ?Sized>(
        &mut self,
        prompter: &mut P,
        fields: &[PromptField],
    ) -> Result<()> {
        for field in fields {
            let answer = prompter.ask(field)?;
            self.assign(field.key, answer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Vec<&'static str>);

    impl Prompter for Canned {
        fn ask(&mut self, field: &PromptField) -> Result<String> {
            let answer = self.0.remove(0);
            if answer.is_empty() {
                return Ok(field.default.clone().unwrap_or_default());
            }
            Ok(answer.to_string())
        }

        fn ask_secret(&mut self, _label: &str) -> Result<Zeroizing<String>> {
            Ok(Zeroizing::new(String::new()))
        }

        fn notice(&mut self, _message: &str) {}
    }

    #[test]
    fn answers_land_in_their_slots() {
        let fields = [
            PromptField::new(FieldKey::Domain, "Domain", Some("github.com".into())),
            PromptField::new(FieldKey::Email, "Email", None),
            PromptField::new(FieldKey::Name, "Name", None),
        ];
        let mut form = RecordForm::default();
        form.fill(&mut Canned(vec!["", " adam@example.com ", "Adam"]), &fields)
            .unwrap();
        assert_eq!(
            form,
            RecordForm {
                domain: "github.com".into(),
                name: "Adam".into(),
                email: "adam@example.com".into(),
            }
        );
    }
}
