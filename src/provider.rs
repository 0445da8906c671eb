use crate::field::{FieldDescriptor, FieldType, DEST_INSTANCE, SOURCE_INSTANCE};
use indexmap::IndexMap;

/// Source of the output fields declared by the upstream pipeline stages.
///
/// Only queried while a plugin instance is being configured.
pub trait FieldProvider {
    fn lookup(&self, name: &str) -> Option<FieldDescriptor>;
}

/// Field provider backed by a fixed list of declared fields.
#[derive(Debug, Clone, Default)]
pub struct StaticFieldProvider {
    fields: IndexMap<String, FieldDescriptor>,
}

impl StaticFieldProvider {
    pub fn new(fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        StaticFieldProvider {
            fields: fields
                .into_iter()
                .map(|descriptor| (descriptor.name.clone(), descriptor))
                .collect(),
        }
    }

    /// Also declare the string-typed `cf.sinstance` / `cf.dinstance` fields.
    pub fn with_instance_fields(mut self) -> Self {
        for name in [SOURCE_INSTANCE, DEST_INSTANCE] {
            self.fields
                .entry(name.to_string())
                .or_insert_with(|| FieldDescriptor::new(name, FieldType::String));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldProvider for StaticFieldProvider {
    fn lookup(&self, name: &str) -> Option<FieldDescriptor> {
        self.fields.get(name).cloned()
    }
}

impl<P: FieldProvider + ?Sized> FieldProvider for &P {
    fn lookup(&self, name: &str) -> Option<FieldDescriptor> {
        (**self).lookup(name)
    }
}
