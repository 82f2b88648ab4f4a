use serde::{Deserialize, Serialize};

/// Type tag assigned by the classifier. Drives how a value is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Select,
    RadioGroup,
    Checkbox,
    CustomDropdown,
    #[serde(rename = "datepicker")]
    DatePicker,
    SearchableSelect,
    /// Upload inputs. Never filled, never counted.
    File,
}

impl FieldType {
    /// Types the batch phase leaves to the individual phase.
    pub fn needs_individual_handling(&self) -> bool {
        matches!(
            self,
            FieldType::File
                | FieldType::RadioGroup
                | FieldType::Checkbox
                | FieldType::SearchableSelect
        )
    }

    /// Types whose written value must be one of the field's options.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Select
                | FieldType::RadioGroup
                | FieldType::CustomDropdown
                | FieldType::SearchableSelect
        )
    }
}

/// Raw metadata for one field as reported by the page host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMetadata {
    pub id: String,
    /// Lowercase element tag: "input", "select", "textarea", "div", ...
    pub tag: String,
    pub input_type: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub class_hints: Vec<String>,
    pub placeholder: Option<String>,
    pub aria_haspopup: bool,
    pub multiple: bool,
    pub options: Vec<String>,
    pub format: Option<String>,
    pub value: Option<String>,
    pub disabled: bool,
    pub visible: bool,
}

impl Default for FieldMetadata {
    fn default() -> Self {
        Self {
            id: String::new(),
            tag: "input".to_string(),
            input_type: None,
            role: None,
            name: None,
            class_hints: Vec::new(),
            placeholder: None,
            aria_haspopup: false,
            multiple: false,
            options: Vec::new(),
            format: None,
            value: None,
            disabled: false,
            visible: true,
        }
    }
}

impl FieldMetadata {
    /// True when the field currently holds no value.
    pub fn is_empty(&self) -> bool {
        self.value.as_deref().map(str::trim).unwrap_or("").is_empty()
    }
}

/// Classified field. Built fresh on every enumeration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub options: Vec<String>,
    pub format: Option<String>,
    pub multiple: bool,
    /// A choice widget with no options yet: they load on demand.
    pub options_pending: bool,
}
