use std::{fmt::Debug, str::FromStr};

use four_cc::FourCC;
use strum::IntoEnumIterator;

use super::{Parameter, ParameterType, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// An enum parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumParameter {
    id: FourCC,
    name: &'static str,
    values: Vec<String>,
    default_index: usize,
}

impl EnumParameter {
    pub fn new<E: IntoEnumIterator + ToString + PartialEq>(
        id: FourCC,
        name: &'static str,
        default: E,
    ) -> Self {
        let values = E::iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let default_index = E::iter().position(|v| v == default).unwrap_or(0);
        Self {
            id,
            name,
            values,
            default_index,
        }
    }

    /// The parameter's value strings.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The parameter's default value string.
    pub fn default_value(&self) -> &String {
        &self.values[self.default_index]
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: &str) -> f32 {
        if let Some(index) = self.values.iter().position(|v| v == value) {
            return index as f32 / (self.values.len() - 1) as f32;
        }
        0.0
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value string.
    pub fn denormalize_value(&self, normalized: f32) -> &String {
        assert!((0.0..=1.0).contains(&normalized));
        let index = (normalized * (self.values.len() - 1) as f32).round() as usize;
        &self.values[index]
    }
}

impl Parameter for EnumParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Enum {
            values: self.values.clone(),
            default_index: self.default_index,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.default_index as f32 / (self.values.len() - 1) as f32
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.denormalize_value(normalized.clamp(0.0, 1.0)).clone()
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        self.values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(string))
            .map(|index| index as f32 / (self.values.len() - 1) as f32)
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds an enum parameter value and its description.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumParameterValue<T: Sized + Clone> {
    /// The parameter's description and constraints.
    description: EnumParameter,
    /// The current value of the parameter.
    value: T,
}

impl<T> EnumParameterValue<T>
where
    T: Sized + Clone + FromStr + IntoEnumIterator + 'static,
    <T as FromStr>::Err: Debug,
{
    /// Create a new parameter value with the given parameter description, initialized to the
    /// parameter's default value.
    pub fn from_description(description: EnumParameter) -> Self {
        let value = T::from_str(description.default_value()).expect("Invalid enum default");
        Self { value, description }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &EnumParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> T {
        self.value.clone()
    }

    /// Set a new value.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    /// Applies a parameter update.
    pub fn apply_update(&mut self, update: &ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<T>() {
                    self.value = value.clone();
                } else if let Some(index) = raw.downcast_ref::<i32>() {
                    let index = (*index).clamp(0, T::iter().count() as i32 - 1) as usize;
                    if let Some(value) = T::iter().nth(index) {
                        self.value = value;
                    }
                } else {
                    log::warn!(
                        "Invalid value type for enum parameter '{}'",
                        self.description.id()
                    );
                }
            }
            ParameterValueUpdate::Normalized(normalized) => {
                let string = self.description.denormalize_value(normalized.clamp(0.0, 1.0));
                match T::from_str(string) {
                    Ok(value) => self.value = value,
                    Err(err) => log::warn!(
                        "Failed to convert enum parameter value '{string}': {err:?}"
                    ),
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, strum::Display, strum::EnumString, strum::EnumIter)]
    enum TestChoice {
        #[strum(serialize = "ONE")]
        One,
        #[strum(serialize = "TWO")]
        Two,
        #[strum(serialize = "THREE")]
        Three,
    }

    #[test]
    fn value_conversion() {
        let parameter = EnumParameter::new(FourCC(*b"test"), "Test", TestChoice::Two);
        assert_eq!(parameter.values(), &["ONE", "TWO", "THREE"]);
        assert_eq!(parameter.default_value(), "TWO");
        assert_eq!(parameter.denormalize_value(0.0), "ONE");
        assert_eq!(parameter.denormalize_value(1.0), "THREE");
        assert_eq!(parameter.normalized_value_to_string(0.5, false), "TWO");
        assert_eq!(parameter.string_to_normalized_value("three"), Some(1.0));
        assert_eq!(parameter.string_to_normalized_value("junk"), None);
    }

    #[test]
    fn update_handling() {
        let mut value = EnumParameterValue::<TestChoice>::from_description(EnumParameter::new(
            FourCC(*b"test"),
            "Test",
            TestChoice::One,
        ));
        assert_eq!(value.value(), TestChoice::One);
        value.apply_update(&ParameterValueUpdate::Normalized(1.0));
        assert_eq!(value.value(), TestChoice::Three);
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(TestChoice::Two)));
        assert_eq!(value.value(), TestChoice::Two);
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(0_i32)));
        assert_eq!(value.value(), TestChoice::One);
    }
}
