use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{no_error, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::{helpers, BoxedValidator},
    paths::{LazyLocation, Location},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct RequiredValidator {
    required: Vec<String>,
    location: Location,
}

pub(crate) struct SingleItemRequiredValidator {
    property: String,
    location: Location,
}

/// Emit one presence check per name.
pub(crate) fn write_checks(
    ctx: &compiler::Context,
    names: &[&str],
    keyword: &str,
) -> Result<(), CompileStop> {
    for name in names {
        let property = ctx.property_data(name)?;
        ctx.check(&format("%s === undefined", &[Arg::Code(&property)])?, keyword)?;
    }
    Ok(())
}

#[inline]
pub(crate) fn compile(
    ctx: &compiler::Context,
    value: &Value,
) -> Result<Option<BoxedValidator>, CompileStop> {
    let names = helpers::string_list(ctx, "required", value)?;
    write_checks(ctx, &names, "required")?;
    let location = ctx.keyword_location("required");
    Ok(match names.as_slice() {
        [] => None,
        [property] => Some(Box::new(SingleItemRequiredValidator {
            property: (*property).to_string(),
            location,
        })),
        _ => Some(Box::new(RequiredValidator {
            required: names.iter().map(|name| (*name).to_string()).collect(),
            location,
        })),
    })
}

impl Validate for RequiredValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Object(item) = instance {
            if item.len() < self.required.len() {
                return false;
            }
            self.required.iter().all(|property| item.contains_key(property))
        } else {
            true
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        _ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        if let Value::Object(item) = instance {
            for property in &self.required {
                if !item.contains_key(property) {
                    return Err(ValidationError::new(
                        self.location.clone(),
                        location.materialize(),
                        instance,
                        ValidationErrorKind::Required {
                            property: property.clone(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        _ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        if let Value::Object(item) = instance {
            let mut errors = vec![];
            for property in &self.required {
                if !item.contains_key(property) {
                    errors.push(ValidationError::new(
                        self.location.clone(),
                        location.materialize(),
                        instance,
                        ValidationErrorKind::Required {
                            property: property.clone(),
                        },
                    ));
                }
            }
            if !errors.is_empty() {
                return Box::new(errors.into_iter());
            }
        }
        no_error()
    }
}

impl Validate for SingleItemRequiredValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Object(item) = instance {
            item.contains_key(&self.property)
        } else {
            true
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        if self.is_valid(instance, ctx) {
            Ok(())
        } else {
            Err(ValidationError::new(
                self.location.clone(),
                location.materialize(),
                instance,
                ValidationErrorKind::Required {
                    property: self.property.clone(),
                },
            ))
        }
    }
}
