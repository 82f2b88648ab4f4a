//! Field Classifier: maps raw field metadata to a `FieldDescriptor`.
//!
//! Order matters: the first matching rule wins, and anything unrecognised
//! falls through to a plain text input.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::form::models::{FieldDescriptor, FieldMetadata, FieldType};

const MULTI_WIDGET_HINTS: &[&str] = &[
    "multiselect",
    "multi-select",
    "select2-multiple",
    "chosen-multi",
    "tags-input",
    "tagsinput",
];

const SEARCHABLE_HINTS: &[&str] = &[
    "searchable",
    "autocomplete",
    "typeahead",
    "async-select",
    "lazy-options",
    "select-search",
];

const POPUP_HINTS: &[&str] = &["dropdown", "combobox", "custom-select", "listbox", "select__control"];

const POPUP_ROLES: &[&str] = &["combobox", "listbox"];

const DATE_INPUT_TYPES: &[&str] = &["date", "datetime-local", "month"];

/// Matches date-ish tokens on word boundaries only ("update" and "metadata" stay out).
static DATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(date|data|datepicker|calendar|datum|fecha|dob)\b")
        .expect("date token regex is valid")
});

/// Splits camelCase and separator-joined identifiers into space-separated words.
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel boundary regex is valid"));

pub fn classify(meta: &FieldMetadata) -> FieldDescriptor {
    let field_type = classify_type(meta);

    let multiple = match field_type {
        FieldType::Select => meta.multiple || has_hint(meta, MULTI_WIDGET_HINTS),
        _ => false,
    };
    let options = clean_options(&meta.options);
    let options_pending = field_type.is_choice() && options.is_empty();

    FieldDescriptor {
        id: meta.id.clone(),
        field_type,
        options,
        format: meta.format.clone(),
        multiple,
        options_pending,
    }
}

fn classify_type(meta: &FieldMetadata) -> FieldType {
    let tag = meta.tag.to_lowercase();
    let input_type = meta.input_type.as_deref().map(str::to_lowercase);
    let role = meta.role.as_deref().map(str::to_lowercase);

    if input_type.as_deref() == Some("file") {
        return FieldType::File;
    }
    if has_hint(meta, MULTI_WIDGET_HINTS) {
        return FieldType::Select;
    }
    if tag == "select" {
        return FieldType::Select;
    }
    if input_type.as_deref() == Some("radio")
        || role.as_deref() == Some("radiogroup")
        || has_hint(meta, &["radio-group"])
    {
        return FieldType::RadioGroup;
    }
    if input_type.as_deref() == Some("checkbox")
        || matches!(role.as_deref(), Some("checkbox") | Some("switch"))
    {
        return FieldType::Checkbox;
    }
    if has_hint(meta, SEARCHABLE_HINTS) {
        return FieldType::SearchableSelect;
    }
    if meta.aria_haspopup
        || role.as_deref().is_some_and(|r| POPUP_ROLES.contains(&r))
        || has_hint(meta, POPUP_HINTS)
    {
        return FieldType::CustomDropdown;
    }
    if input_type
        .as_deref()
        .is_some_and(|t| DATE_INPUT_TYPES.contains(&t))
        || has_date_marker(meta)
    {
        return FieldType::DatePicker;
    }
    if tag == "textarea" {
        return FieldType::Textarea;
    }

    if !matches!(tag.as_str(), "input" | "") {
        debug!(field_id = %meta.id, tag = %tag, "Ambiguous field markup, treating as text");
    }
    FieldType::Text
}

fn has_hint(meta: &FieldMetadata, hints: &[&str]) -> bool {
    meta.class_hints.iter().any(|class| {
        let class = class.to_lowercase();
        hints.iter().any(|h| class.contains(h))
    })
}

fn has_date_marker(meta: &FieldMetadata) -> bool {
    let sources = std::iter::once(meta.id.as_str())
        .chain(meta.name.as_deref())
        .chain(meta.placeholder.as_deref())
        .chain(meta.class_hints.iter().map(String::as_str));

    sources.into_iter().any(|raw| {
        let spaced = CAMEL_BOUNDARY.replace_all(raw, "$1 $2");
        let spaced = spaced.replace(['_', '-', '.', '[', ']'], " ");
        DATE_TOKEN.is_match(&spaced)
    })
}

/// Drops blank entries and common "pick one" placeholders from an option list.
fn clean_options(options: &[String]) -> Vec<String> {
    options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter(|o| !crate::resolution::placeholder::is_placeholder_label(o))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: &str) -> FieldMetadata {
        FieldMetadata {
            id: "f1".to_string(),
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_native_select_is_select() {
        let mut meta = field("select");
        meta.options = vec!["Select...".into(), "Yes".into(), "No".into()];
        let d = classify(&meta);
        assert_eq!(d.field_type, FieldType::Select);
        assert_eq!(d.options, vec!["Yes", "No"]);
        assert!(!d.multiple);
    }

    #[test]
    fn test_multi_widget_marker_wins_over_popup_role() {
        let mut meta = field("div");
        meta.role = Some("combobox".into());
        meta.class_hints = vec!["vue-multiselect".into()];
        let d = classify(&meta);
        assert_eq!(d.field_type, FieldType::Select);
        assert!(d.multiple);
    }

    #[test]
    fn test_radio_and_checkbox() {
        let mut radio = field("input");
        radio.input_type = Some("radio".into());
        assert_eq!(classify(&radio).field_type, FieldType::RadioGroup);

        let mut group = field("div");
        group.role = Some("radiogroup".into());
        assert_eq!(classify(&group).field_type, FieldType::RadioGroup);

        let mut check = field("input");
        check.input_type = Some("checkbox".into());
        assert_eq!(classify(&check).field_type, FieldType::Checkbox);
    }

    #[test]
    fn test_searchable_select_with_no_options_is_pending() {
        let mut meta = field("input");
        meta.class_hints = vec!["city-autocomplete".into()];
        let d = classify(&meta);
        assert_eq!(d.field_type, FieldType::SearchableSelect);
        assert!(d.options_pending);
        assert!(d.options.is_empty());

        let mut select = field("select");
        select.options = vec!["Poland".into()];
        assert!(!classify(&select).options_pending);
        assert!(!classify(&field("textarea")).options_pending);
    }

    #[test]
    fn test_popup_markers() {
        let mut meta = field("div");
        meta.aria_haspopup = true;
        assert_eq!(classify(&meta).field_type, FieldType::CustomDropdown);

        let mut by_class = field("button");
        by_class.class_hints = vec!["country-dropdown".into()];
        assert_eq!(classify(&by_class).field_type, FieldType::CustomDropdown);
    }

    #[test]
    fn test_date_markers_need_word_boundaries() {
        let mut start = field("input");
        start.name = Some("startDate".into());
        assert_eq!(classify(&start).field_type, FieldType::DatePicker);

        let mut polish = field("input");
        polish.placeholder = Some("Data rozpoczęcia".into());
        assert_eq!(classify(&polish).field_type, FieldType::DatePicker);

        let mut update = field("input");
        update.name = Some("update_reason".into());
        assert_eq!(classify(&update).field_type, FieldType::Text);

        let mut metadata = field("input");
        metadata.id = "metadata".into();
        assert_eq!(classify(&metadata).field_type, FieldType::Text);
    }

    #[test]
    fn test_native_date_input() {
        let mut meta = field("input");
        meta.input_type = Some("date".into());
        assert_eq!(classify(&meta).field_type, FieldType::DatePicker);
    }

    #[test]
    fn test_textarea_and_default() {
        assert_eq!(classify(&field("textarea")).field_type, FieldType::Textarea);
        assert_eq!(classify(&field("input")).field_type, FieldType::Text);
        assert_eq!(classify(&field("span")).field_type, FieldType::Text);
    }

    #[test]
    fn test_file_input_is_tagged_file() {
        let mut meta = field("input");
        meta.input_type = Some("file".into());
        assert_eq!(classify(&meta).field_type, FieldType::File);
        assert!(FieldType::File.needs_individual_handling());
    }
}
