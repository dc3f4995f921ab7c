pub(crate) mod all_of;
pub(crate) mod any_of;
pub(crate) mod array_length;
pub(crate) mod boolean;
pub(crate) mod const_;
pub(crate) mod contains;
pub(crate) mod content;
pub(crate) mod dependencies;
pub(crate) mod enum_;
pub(crate) mod format;
pub(crate) mod helpers;
pub(crate) mod if_;
pub(crate) mod items;
pub(crate) mod minmax;
pub(crate) mod multiple_of;
pub(crate) mod not;
pub(crate) mod object_size;
pub(crate) mod one_of;
pub(crate) mod pattern;
pub(crate) mod properties;
pub(crate) mod property_names;
pub(crate) mod ref_;
pub(crate) mod required;
pub(crate) mod string_length;
pub(crate) mod type_;
pub(crate) mod unevaluated;
pub(crate) mod unique_items;

use crate::{compiler::CompileStop, tracer::EvaluationDelta, validator::Validate};

pub(crate) type BoxedValidator = Box<dyn Validate>;
pub(crate) type CompilationResult = Result<BoxedValidator, CompileStop>;
/// A validator for an applicator keyword, with what it guarantees to evaluate.
pub(crate) type ApplicatorResult = Result<(BoxedValidator, EvaluationDelta), CompileStop>;
