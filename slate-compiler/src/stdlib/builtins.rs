use super::{std_function, StdFunction, StdType};

const ANY: StdType = StdType::Var(0);
const LIST_OF_ANY: StdType = StdType::List(&ANY);

/// Global functions available to every program. Generated code reaches them
/// through the runtime module import.
pub const BUILTINS: &[StdFunction] = &[
    std_function("print", &[ANY], StdType::Nil),
    std_function("text", &[ANY], StdType::Text),
    std_function("length", &[ANY], StdType::Number),
    std_function("append", &[LIST_OF_ANY, ANY], LIST_OF_ANY),
    std_function("floor", &[StdType::Number], StdType::Number),
    std_function("abs", &[StdType::Number], StdType::Number),
    std_function("empty?", &[LIST_OF_ANY], StdType::Boolean),
    std_function("even?", &[StdType::Number], StdType::Boolean),
    std_function("odd?", &[StdType::Number], StdType::Boolean),
    std_function("contains?", &[LIST_OF_ANY, ANY], StdType::Boolean),
];
