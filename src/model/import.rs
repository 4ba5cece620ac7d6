//! Document import: merging, shared-pattern expansion, rule flattening

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::document::DocumentStore;
use crate::manager::FomManager;

use super::FomModel;
use super::attributes::{AttributeDefinition, scalar_to_string};
use super::error::{ModelError, ModelResult};
use super::shared::{self, SharedPattern};
use super::template::PathTemplate;

/// Keys with structural meaning inside a `patterns` node
const NODE_ATTRIBUTES: &str = "fom_attributes";
const NODE_KEY_ATTRIBUTE: &str = "fom_key_attribute";

/// Ambient context attributes injected by the importer itself. They scope
/// rules at construction time (via `selected_rules`) but do not take part in
/// query filtering, so they are created non-discriminant unless a document
/// declares them explicitly.
const BOOKKEEPING_ATTRIBUTES: [&str; 3] = ["fom_name", "fom_process", "fom_parameter"];

impl FomModel {
    /// Read a document from disk and import it.
    ///
    /// `manager` is required when the document (or a transitive dependency)
    /// declares `fom_import`.
    pub fn import_file(&mut self, path: &Path, manager: Option<&FomManager>) -> ModelResult<()> {
        let document = DocumentStore::read(path)?;
        self.import_value(&document, manager)
    }

    /// Import an already-parsed document.
    ///
    /// Importing a `fom_name` that is already part of the model is a no-op.
    /// Declared dependencies are imported first, so their rules precede the
    /// importing document's rules in the flat list.
    pub fn import_value(&mut self, document: &Value, manager: Option<&FomManager>) -> ModelResult<()> {
        let name = document
            .get("fom_name")
            .and_then(Value::as_str)
            .ok_or(ModelError::MissingFomName)?
            .to_string();
        if self.fom_names.iter().any(|n| *n == name) {
            return Ok(());
        }
        // Recorded before dependencies so import cycles terminate.
        self.fom_names.push(name.clone());

        if let Some(imports) = document.get("fom_import") {
            let deps = imports.as_array().ok_or_else(|| ModelError::MalformedRule {
                context: name.clone(),
                message: "'fom_import' must be a list of model names".to_string(),
            })?;
            for dep in deps {
                let dep_name = dep.as_str().ok_or_else(|| ModelError::MalformedRule {
                    context: name.clone(),
                    message: "'fom_import' entries must be strings".to_string(),
                })?;
                if self.fom_names.iter().any(|n| n == dep_name) {
                    continue;
                }
                let manager =
                    manager.ok_or_else(|| ModelError::ManagerRequired(name.clone()))?;
                let path = manager
                    .path_for(dep_name)
                    .ok_or_else(|| ModelError::UnknownImport(dep_name.to_string()))?
                    .clone();
                self.import_file(&path, Some(manager))?;
            }
        }

        self.merge_attribute_definitions(&name, document)?;
        self.merge_formats(&name, document)?;
        self.merge_shared_patterns(&name, document)?;

        let mut ambient = BTreeMap::new();
        ambient.insert("fom_name".to_string(), name.clone());
        if let Some(patterns) = document.get("patterns") {
            self.flatten_node(patterns, &ambient, &format!("{name}.patterns"))?;
        }
        if let Some(processes) = document.get("processes") {
            self.flatten_processes(&name, processes, &ambient)?;
        }

        info!("Imported FOM '{}' ({} rules total)", name, self.rules.len());
        Ok(())
    }

    fn merge_attribute_definitions(&mut self, name: &str, document: &Value) -> ModelResult<()> {
        let Some(section) = document.get("attribute_definitions") else {
            return Ok(());
        };
        let obj = section.as_object().ok_or_else(|| ModelError::MalformedRule {
            context: name.to_string(),
            message: "'attribute_definitions' must be a mapping".to_string(),
        })?;
        for (attr, value) in obj {
            let parsed = AttributeDefinition::from_document(attr, value)?;
            match self.attribute_definitions.get_mut(attr) {
                Some(existing) => existing.merge_from(attr, &parsed)?,
                None => {
                    self.attribute_definitions.insert(attr.clone(), parsed);
                }
            }
        }
        Ok(())
    }

    fn merge_formats(&mut self, name: &str, document: &Value) -> ModelResult<()> {
        let malformed = |message: &str| ModelError::MalformedRule {
            context: name.to_string(),
            message: message.to_string(),
        };

        if let Some(section) = document.get("formats") {
            let obj = section
                .as_object()
                .ok_or_else(|| malformed("'formats' must be a mapping"))?;
            for (format, ext) in obj {
                let ext = ext
                    .as_str()
                    .ok_or_else(|| malformed("format extensions must be strings"))?;
                self.formats
                    .insert(format.clone(), ext.trim_start_matches('.').to_string());
            }
        }

        if let Some(section) = document.get("format_lists") {
            let obj = section
                .as_object()
                .ok_or_else(|| malformed("'format_lists' must be a mapping"))?;
            for (list_name, entries) in obj {
                let items = entries
                    .as_array()
                    .ok_or_else(|| malformed("format lists must be lists"))?;
                let mut formats = Vec::with_capacity(items.len());
                for item in items {
                    let format = item
                        .as_str()
                        .ok_or_else(|| malformed("format list entries must be strings"))?;
                    if !self.formats.contains_key(format) {
                        return Err(ModelError::UnknownFormat(format.to_string()));
                    }
                    formats.push(format.to_string());
                }
                self.format_lists.insert(list_name.clone(), formats);
            }
        }
        Ok(())
    }

    fn merge_shared_patterns(&mut self, name: &str, document: &Value) -> ModelResult<()> {
        let Some(section) = document.get("shared_patterns") else {
            return Ok(());
        };
        let obj = section.as_object().ok_or_else(|| ModelError::MalformedRule {
            context: name.to_string(),
            message: "'shared_patterns' must be a mapping".to_string(),
        })?;
        for (pattern_name, value) in obj {
            self.shared_patterns.insert(
                pattern_name.clone(),
                SharedPattern::from_document(pattern_name, value)?,
            );
        }
        // Re-expanding previously expanded patterns is a no-op; this only
        // resolves references introduced by the document just merged.
        shared::expand_all(&mut self.shared_patterns)
    }

    fn flatten_node(
        &mut self,
        node: &Value,
        ambient: &BTreeMap<String, String>,
        context: &str,
    ) -> ModelResult<()> {
        match node {
            Value::Object(map) => {
                let mut local = ambient.clone();
                if let Some(attrs) = map.get(NODE_ATTRIBUTES) {
                    let obj = attrs.as_object().ok_or_else(|| ModelError::MalformedRule {
                        context: context.to_string(),
                        message: "'fom_attributes' must be a mapping".to_string(),
                    })?;
                    for (k, v) in obj {
                        local.insert(
                            k.clone(),
                            scalar_to_string(v).ok_or_else(|| ModelError::MalformedRule {
                                context: context.to_string(),
                                message: "'fom_attributes' values must be scalars".to_string(),
                            })?,
                        );
                    }
                }
                let key_attribute = map
                    .get(NODE_KEY_ATTRIBUTE)
                    .map(|v| {
                        v.as_str().ok_or_else(|| ModelError::MalformedRule {
                            context: context.to_string(),
                            message: "'fom_key_attribute' must be a string".to_string(),
                        })
                    })
                    .transpose()?;

                for (key, child) in map {
                    if key == NODE_ATTRIBUTES || key == NODE_KEY_ATTRIBUTE {
                        continue;
                    }
                    let mut child_ambient = local.clone();
                    if let Some(attr) = key_attribute {
                        child_ambient.insert(attr.to_string(), key.clone());
                    }
                    self.flatten_node(child, &child_ambient, &format!("{context}.{key}"))?;
                }
                Ok(())
            }
            Value::Array(items) => {
                if items.first().map(Value::is_string).unwrap_or(false) {
                    self.add_rule_spec(items, ambient, context)
                } else {
                    for (i, item) in items.iter().enumerate() {
                        let spec = item.as_array().ok_or_else(|| ModelError::MalformedRule {
                            context: context.to_string(),
                            message: "rule list entries must be [pattern, formats, overrides?]"
                                .to_string(),
                        })?;
                        self.add_rule_spec(spec, ambient, &format!("{context}[{i}]"))?;
                    }
                    Ok(())
                }
            }
            _ => Err(ModelError::MalformedRule {
                context: context.to_string(),
                message: "pattern nodes must be mappings or rule lists".to_string(),
            }),
        }
    }

    fn flatten_processes(
        &mut self,
        name: &str,
        processes: &Value,
        ambient: &BTreeMap<String, String>,
    ) -> ModelResult<()> {
        let obj = processes.as_object().ok_or_else(|| ModelError::MalformedRule {
            context: name.to_string(),
            message: "'processes' must be a mapping".to_string(),
        })?;
        for (process, parameters) in obj {
            let params = parameters.as_object().ok_or_else(|| ModelError::MalformedRule {
                context: format!("{name}.processes.{process}"),
                message: "process entries must map parameters to rules".to_string(),
            })?;
            let mut process_ambient = ambient.clone();
            process_ambient.insert("fom_process".to_string(), process.clone());
            for (parameter, spec) in params {
                let mut parameter_ambient = process_ambient.clone();
                parameter_ambient.insert("fom_parameter".to_string(), parameter.clone());
                self.flatten_node(
                    spec,
                    &parameter_ambient,
                    &format!("{name}.processes.{process}.{parameter}"),
                )?;
            }
        }
        Ok(())
    }

    fn add_rule_spec(
        &mut self,
        spec: &[Value],
        ambient: &BTreeMap<String, String>,
        context: &str,
    ) -> ModelResult<()> {
        let pattern_text = spec
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::MalformedRule {
                context: context.to_string(),
                message: "rule pattern must be a string".to_string(),
            })?;
        let formats = self.resolve_formats(spec.get(1), context)?;

        let mut overrides = BTreeMap::new();
        if let Some(attrs) = spec.get(2) {
            let obj = attrs.as_object().ok_or_else(|| ModelError::MalformedRule {
                context: context.to_string(),
                message: "rule overrides must be a mapping".to_string(),
            })?;
            for (k, v) in obj {
                overrides.insert(
                    k.clone(),
                    scalar_to_string(v).ok_or_else(|| ModelError::MalformedRule {
                        context: context.to_string(),
                        message: "override values must be scalars".to_string(),
                    })?,
                );
            }
        }

        // A list-valued shared pattern fans the declaration out into one rule
        // per variant; rule-specific overrides win over variant overrides,
        // which win over the ambient context.
        for variant in shared::expand_text(pattern_text, &self.shared_patterns, context)? {
            let mut attributes = ambient.clone();
            attributes.extend(variant.overrides);
            attributes.extend(overrides.clone());
            self.push_rule(&variant.fragment, formats.clone(), attributes)?;
        }
        Ok(())
    }

    fn resolve_formats(&self, value: Option<&Value>, context: &str) -> ModelResult<Vec<String>> {
        match value {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(name)) => {
                if let Some(list) = self.format_lists.get(name) {
                    Ok(list.clone())
                } else if self.formats.contains_key(name) {
                    Ok(vec![name.clone()])
                } else {
                    Err(ModelError::UnknownFormat(name.clone()))
                }
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    let name = item.as_str().ok_or_else(|| ModelError::MalformedRule {
                        context: context.to_string(),
                        message: "format names must be strings".to_string(),
                    })?;
                    if self.formats.contains_key(name) {
                        Ok(name.to_string())
                    } else {
                        Err(ModelError::UnknownFormat(name.to_string()))
                    }
                })
                .collect(),
            Some(_) => Err(ModelError::MalformedRule {
                context: context.to_string(),
                message: "rule formats must be a name or a list of names".to_string(),
            }),
        }
    }

    fn push_rule(
        &mut self,
        pattern_text: &str,
        formats: Vec<String>,
        attributes: BTreeMap<String, String>,
    ) -> ModelResult<()> {
        let (directory, template) = PathTemplate::parse(pattern_text)?;

        // Placeholder attributes without a declared value set accept any
        // string; undeclared ones are created on the fly.
        for attr in template.attributes() {
            let def = self
                .attribute_definitions
                .entry(attr.to_string())
                .or_default();
            if !def.has_declared_values {
                def.open_value = true;
            }
        }
        // Attribute values introduced by the rule context fold back into the
        // declared value sets.
        for (attr, value) in &attributes {
            let def = self
                .attribute_definitions
                .entry(attr.clone())
                .or_insert_with(|| AttributeDefinition {
                    open_value: true,
                    discriminant: !BOOKKEEPING_ATTRIBUTES.contains(&attr.as_str()),
                    ..Default::default()
                });
            def.values.insert(value.clone());
        }

        let segments: Vec<&str> = template.segments().iter().map(|s| s.raw()).collect();
        let index = self.rules.len();
        self.patterns.insert(&segments, index);
        self.rules.push(super::Rule {
            template,
            directory,
            formats,
            attributes,
        });
        Ok(())
    }
}
