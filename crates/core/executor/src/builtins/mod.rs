//! The builtin function library available to every dialogue.

mod boolean;
mod conversion;
mod enums;
pub(crate) mod math;
mod number;
mod string;
mod visitation;

use hashbrown::HashMap;

use crate::function::{functionify, BoxedFunction};

/// Creates the builtin function map.
#[must_use]
pub fn default_function_map() -> HashMap<String, BoxedFunction> {
    // Use an array to store function tuples to simplify insertion
    let functions: &[(&str, BoxedFunction)] = &[
        ("Number.UnaryMinus", functionify(number::unary_minus)),
        ("Number.Add", functionify(number::add)),
        ("Number.Minus", functionify(number::minus)),
        ("Number.Multiply", functionify(number::multiply)),
        ("Number.Divide", functionify(number::divide)),
        ("Number.Modulo", functionify(number::modulo)),
        ("Number.EqualTo", functionify(number::equal_to)),
        ("Number.NotEqualTo", functionify(number::not_equal_to)),
        ("Number.GreaterThan", functionify(number::greater_than)),
        ("Number.GreaterThanOrEqualTo", functionify(number::greater_than_or_equal_to)),
        ("Number.LessThan", functionify(number::less_than)),
        ("Number.LessThanOrEqualTo", functionify(number::less_than_or_equal_to)),
        ("Bool.Not", functionify(boolean::not)),
        ("Bool.EqualTo", functionify(boolean::equal_to)),
        ("Bool.NotEqualTo", functionify(boolean::not_equal_to)),
        ("Bool.Or", functionify(boolean::or)),
        ("Bool.And", functionify(boolean::and)),
        ("Bool.Xor", functionify(boolean::not_equal_to)),
        ("String.EqualTo", functionify(string::equal_to)),
        ("String.NotEqualTo", functionify(string::not_equal_to)),
        ("String.Add", functionify(string::add)),
        ("Enum.EqualTo", functionify(enums::equal_to)),
        ("Enum.NotEqualTo", functionify(enums::not_equal_to)),
        ("number", functionify(conversion::number)),
        ("string", functionify(conversion::string)),
        ("bool", functionify(conversion::bool)),
        ("visited", functionify(visitation::visited)),
        ("visited_count", functionify(visitation::visited_count)),
        ("random", functionify(math::random)),
        ("random_range", functionify(math::random_range)),
        ("dice", functionify(math::dice)),
        ("round", functionify(math::round)),
        ("round_places", functionify(math::round_places)),
        ("floor", functionify(math::floor)),
        ("ceil", functionify(math::ceil)),
        ("inc", functionify(math::inc)),
        ("dec", functionify(math::dec)),
        ("decimal", functionify(math::decimal)),
        ("int", functionify(math::int)),
    ];

    functions.iter().map(|(name, f)| ((*name).to_string(), f.clone())).collect()
}
