//! Symbolic references to not-yet-materialized outputs
//!
//! A [`Reference`] names `(block kind, resource type, resource name, field)`.
//! It is rendered to a placeholder the provisioning engine substitutes at
//! apply time:
//!
//! ```text
//! ${aws_vpc.main.id}                                   managed resource
//! ${data.aws_ami.ubuntu.image_id}                      data source
//! ${data.terraform_remote_state.network.outputs.vpc_id}  remote lookup
//! ```
//!
//! References cannot be built directly; they come from `Template::mint`,
//! from a declaration's façade, or from a remote lookup, all of which check
//! that the target has been declared first.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a block is a managed resource or a read-only data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Resource,
    Data,
}

impl BlockKind {
    /// Top-level document section for this kind
    pub fn section(&self) -> &'static str {
        match self {
            BlockKind::Resource => "resource",
            BlockKind::Data => "data",
        }
    }
}

/// Placeholder opening token
pub const PLACEHOLDER_OPEN: &str = "${";
/// Placeholder closing token
pub const PLACEHOLDER_CLOSE: &str = "}";
/// Separator between address components
pub const DELIMITER: char = '.';

/// Pointer to an output field of a declared block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    kind: BlockKind,
    resource_type: String,
    name: String,
    field: String,
}

impl Reference {
    pub(crate) fn new(
        kind: BlockKind,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            resource_type: resource_type.into(),
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Address of the target block without the field (`aws_vpc.main`)
    pub fn address(&self) -> String {
        match self.kind {
            BlockKind::Resource => format!("{}{}{}", self.resource_type, DELIMITER, self.name),
            BlockKind::Data => format!(
                "data{d}{}{d}{}",
                self.resource_type,
                self.name,
                d = DELIMITER
            ),
        }
    }

    /// The same target, one level deeper (`outputs` -> `outputs.vpc_id`)
    pub fn nested(&self, segment: &str) -> Self {
        let mut nested = self.clone();
        nested.field = format!("{}{}{}", self.field, DELIMITER, segment);
        nested
    }

    /// Canonical placeholder form
    pub fn render(&self) -> String {
        format!(
            "{}{}{}{}{}",
            PLACEHOLDER_OPEN,
            self.address(),
            DELIMITER,
            self.field,
            PLACEHOLDER_CLOSE
        )
    }

    /// Bare expression without the placeholder wrapper, used for
    /// meta-arguments that take addresses rather than interpolations
    pub fn expression(&self) -> String {
        format!("{}{}{}", self.address(), DELIMITER, self.field)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_resource() {
        let r = Reference::new(BlockKind::Resource, "aws_db_instance", "primary", "endpoint");
        assert_eq!(r.render(), "${aws_db_instance.primary.endpoint}");
        assert_eq!(r.address(), "aws_db_instance.primary");
        assert_eq!(r.to_string(), r.render());
    }

    #[test]
    fn test_render_data() {
        let r = Reference::new(BlockKind::Data, "aws_ami", "ubuntu", "id");
        assert_eq!(r.render(), "${data.aws_ami.ubuntu.id}");
        assert_eq!(r.expression(), "data.aws_ami.ubuntu.id");
    }

    #[test]
    fn test_render_is_idempotent() {
        let a = Reference::new(BlockKind::Resource, "aws_vpc", "main", "id");
        let b = Reference::new(BlockKind::Resource, "aws_vpc", "main", "id");
        assert_eq!(a.render(), a.render());
        assert_eq!(a.render(), b.render());
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested() {
        let r = Reference::new(BlockKind::Data, "terraform_remote_state", "network", "outputs");
        assert_eq!(
            r.nested("vpc_id").render(),
            "${data.terraform_remote_state.network.outputs.vpc_id}"
        );
    }
}
