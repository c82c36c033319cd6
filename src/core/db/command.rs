//! Commands and their bound parameter collections.

use crate::core::db::parameter::Parameter;
use uuid::Uuid;

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
}

impl CommandKind {
    pub fn from_stored_procedure(is_stored_procedure: bool) -> Self {
        if is_stored_procedure {
            CommandKind::StoredProcedure
        } else {
            CommandKind::Text
        }
    }
}

/// Connection (and transaction) a command was last executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub connection: Uuid,
    pub transaction: Option<Uuid>,
}

/// Ordered parameters bound to a command.
///
/// Lookups compare names ASCII case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterCollection {
    items: Vec<Parameter>,
}

impl ParameterCollection {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index_of(name).map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.index_of(name).map(move |i| &mut self.items[i])
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.items.push(parameter);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a ParameterCollection {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A command ready to be executed by a provider connection.
///
/// Commands are produced by a provider factory, which fixes the parameter
/// marker used to normalize parameter names.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    kind: CommandKind,
    text: String,
    marker: String,
    parameters: ParameterCollection,
    template: Parameter,
    attachment: Option<Attachment>,
}

impl Command {
    /// Creates an empty text command for a provider using `marker`.
    pub fn new(marker: impl Into<String>) -> Self {
        Command {
            kind: CommandKind::Text,
            text: String::new(),
            marker: marker.into(),
            parameters: ParameterCollection::default(),
            template: Parameter::default(),
            attachment: None,
        }
    }

    /// Uses `template` for parameters created by the binder.
    pub fn with_parameter_template(mut self, template: Parameter) -> Self {
        self.template = template;
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: CommandKind) {
        self.kind = kind;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Prefix required before every bound parameter name.
    pub fn parameter_marker(&self) -> &str {
        &self.marker
    }

    pub fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterCollection {
        &mut self.parameters
    }

    /// Creates a blank parameter from the provider's template; the caller
    /// names it and appends it.
    pub fn create_parameter(&self) -> Parameter {
        self.template.clone()
    }

    pub fn attachment(&self) -> Option<Attachment> {
        self.attachment
    }

    pub(crate) fn attach(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
    }
}
