//! Parameter binding onto commands.
//!
//! Names are normalized in one place so callers may pass `id` or `@id`
//! interchangeably. Values go through [`ParamArg::into_value`]: parameter-like
//! arguments are unwrapped and absent values become the no-value marker.

use crate::core::db::command::Command;
use crate::core::db::parameter::{DbType, Direction, ParamArg, Parameter};
use crate::core::{DbError, Result};
use tracing::trace;

/// Trims `name` and prefixes `marker` unless it is already there.
///
/// Fails with `InvalidArgument` naming `name` when nothing is left after
/// trimming. Applying it to its own output returns the same string.
pub fn normalize_name(marker: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DbError::invalid_argument("name", "parameter name is required"));
    }

    if trimmed.starts_with(marker) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}{}", marker, trimmed))
    }
}

impl Command {
    /// Binds an input parameter. See [`Command::add_parameter_with_direction`].
    pub fn add_parameter(
        &mut self,
        name: &str,
        db_type: DbType,
        value: impl Into<ParamArg>,
    ) -> Result<()> {
        self.add_parameter_with_direction(name, db_type, value, Direction::Input)
    }

    /// Binds a parameter, reconfiguring it in place if the name is already bound.
    pub fn add_parameter_with_direction(
        &mut self,
        name: &str,
        db_type: DbType,
        value: impl Into<ParamArg>,
        direction: Direction,
    ) -> Result<()> {
        let parameter_name = normalize_name(self.parameter_marker(), name)?;
        let value = value.into().into_value();

        if self.parameters().contains(&parameter_name) {
            trace!(parameter = %parameter_name, "reconfiguring bound parameter");
        } else {
            let mut created = self.create_parameter();
            created.name = parameter_name.clone();
            self.parameters_mut().push(created);
        }

        if let Some(parameter) = self.parameters_mut().get_mut(&parameter_name) {
            parameter.db_type = db_type;
            parameter.direction = direction;
            parameter.value = value;
        }
        Ok(())
    }

    /// Binds a prepared [`Parameter`] using its own fields.
    pub fn add_parameter_value(&mut self, parameter: &Parameter) -> Result<()> {
        self.add_parameter_with_direction(
            &parameter.name,
            parameter.db_type,
            parameter.value.clone(),
            parameter.direction,
        )
    }

    /// Binds each parameter in order. An empty slice binds nothing.
    pub fn add_parameters(&mut self, parameters: &[Parameter]) -> Result<()> {
        for parameter in parameters {
            self.add_parameter_value(parameter)?;
        }
        Ok(())
    }

    /// Updates the value of an already-bound parameter.
    ///
    /// Unbound names are ignored without error: callers may set parameters
    /// that were only conditionally added.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamArg>) -> Result<()> {
        let parameter_name = normalize_name(self.parameter_marker(), name)?;

        if let Some(parameter) = self.parameters_mut().get_mut(&parameter_name) {
            parameter.value = value.into().into_value();
        }
        Ok(())
    }
}
