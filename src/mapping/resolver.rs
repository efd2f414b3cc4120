use std::collections::BTreeMap;

use crate::error::AppResult;
use crate::mapping::{AttributeModifier, MappingRule, MappingTable, Token};
use crate::models::{DirectoryEntry, FieldValue, LocalRecord};
use crate::utils::current_epoch_seconds;

/// Field values computed from one directory entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFields {
    pub name: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub extra: BTreeMap<String, FieldValue>,
}

/// Applies a mapping table to directory entries. Performs no I/O.
pub struct MappingResolver;

impl MappingResolver {
    /// Compute the mapped field values of an entry.
    ///
    /// Fields whose attributes are absent from the entry are omitted rather
    /// than set to an empty value.
    pub fn resolve(entry: &DirectoryEntry, table: &MappingTable) -> AppResult<ResolvedFields> {
        let mut resolved = ResolvedFields::default();

        for rule in table.rules() {
            let Some(value) = Self::resolve_rule(entry, table, rule)? else {
                continue;
            };
            if rule.field == table.name_field() {
                resolved.name = Some(value.as_text());
            } else if rule.is_auxiliary() {
                resolved.extra.insert(rule.field.clone(), value);
            } else {
                resolved.fields.insert(rule.field.clone(), value);
            }
        }

        Ok(resolved)
    }

    /// Merge a directory entry into an existing or blank local record.
    ///
    /// Only mapped fields are overwritten; bookkeeping fields (id, flags,
    /// memberships, password) and unmapped fields are left as they were.
    pub fn merge(
        entry: &DirectoryEntry,
        local: &LocalRecord,
        table: &MappingTable,
    ) -> AppResult<LocalRecord> {
        let resolved = Self::resolve(entry, table)?;
        let mut merged = local.clone();

        merged.dn = entry.dn.clone();
        if let Some(name) = resolved.name {
            merged.name = name;
        }
        merged.fields.extend(resolved.fields);
        merged.extra.extend(resolved.extra);

        Ok(merged)
    }

    fn resolve_rule(
        entry: &DirectoryEntry,
        table: &MappingTable,
        rule: &MappingRule,
    ) -> AppResult<Option<FieldValue>> {
        // A lone reference keeps its full shape; everything else is a template
        if let [token] = rule.tokens.as_slice() {
            return Self::resolve_token(entry, table, token);
        }

        let mut text = String::new();
        for token in &rule.tokens {
            match Self::resolve_token(entry, table, token)? {
                Some(value) => text.push_str(&value.as_text()),
                None => return Ok(None),
            }
        }
        Ok(Some(FieldValue::Single(text)))
    }

    fn resolve_token(
        entry: &DirectoryEntry,
        table: &MappingTable,
        token: &Token,
    ) -> AppResult<Option<FieldValue>> {
        let value = match token {
            Token::Literal(text) => Some(FieldValue::Single(text.clone())),
            Token::Date => Some(FieldValue::Single(current_epoch_seconds())),
            Token::Attribute { name, modifier } => entry.get(name).and_then(|value| match modifier {
                AttributeModifier::All => Some(FieldValue::from(value)),
                AttributeModifier::First => value.first().map(|v| FieldValue::Single(v.to_string())),
                AttributeModifier::Join(separator) => {
                    Some(FieldValue::Single(value.values().join(separator)))
                }
            }),
            Token::Hook { name, argument } => {
                table.hook(name)?.resolve(entry, argument.as_deref())?
            }
        };
        Ok(value)
    }
}
