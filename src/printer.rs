// Omniclass Printer
//
// Deterministic textual renderings of classes and instances. Property
// order follows declaration order, so the same definitions always print
// the same text.

use crate::class::{ClassId, Parent};
use crate::errors::Result;
use crate::object::Instance;
use crate::registry::Registry;
use crate::value::Value;

pub struct Printer<'a> {
    registry: &'a Registry,
}

impl<'a> Printer<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Render a class: name, parent name, and the effective property set
    /// as ordered name/type pairs.
    pub fn class(&self, id: ClassId) -> Result<String> {
        let cls = self.registry.class(id)?;
        let parent = match cls.parent {
            Parent::Root => "any".to_string(),
            Parent::Base(bt) => bt.name().to_string(),
            Parent::Class(p) => self.registry.class(p)?.name.clone(),
        };
        let mut out = format!("<class {} : {parent}>", cls.name);
        for (name, prop) in &cls.props {
            out.push_str(&format!(
                "\n  @{name} <{}>{}",
                prop.constraint.describe(self.registry),
                if prop.is_computed() { " computed" } else { "" }
            ));
        }
        Ok(out)
    }

    /// Render an instance: class name, payload if any, and ordered
    /// property name/value pairs (computed properties included).
    pub fn instance(&self, inst: &Instance) -> Result<String> {
        let cls = self.registry.class(inst.class)?;
        let mut out = format!("<{}>", cls.name);
        if inst.payload != Value::Nil {
            out.push_str(&format!(" {}", inst.payload));
        }
        for name in cls.props.keys() {
            let value = self.registry.get_property(inst, name)?;
            out.push_str(&format!("\n  @{name} = {value}"));
        }
        Ok(out)
    }
}
