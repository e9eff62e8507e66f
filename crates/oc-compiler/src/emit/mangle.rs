//! Name mangling for methods, constructors, and LLVM identified struct
//! types. Bracket and other non-identifier characters in a type's canonical
//! name (`Array[Integer]`) are not valid in an unquoted LLVM global name, so
//! every mangled piece is sanitized first.

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn struct_type_name(class: &str) -> String {
    format!("%{}", sanitize(class))
}

pub fn method_symbol(class: &str, method: &str, param_types: &[String]) -> String {
    let mut out = format!("@{}_{}", sanitize(class), sanitize(method));
    for p in param_types {
        out.push_str("__");
        out.push_str(&sanitize(p));
    }
    out
}

pub fn ctor_symbol(class: &str, param_types: &[String]) -> String {
    let mut out = format!("@{}_ctor", sanitize(class));
    for p in param_types {
        out.push_str("__");
        out.push_str(&sanitize(p));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_parameter_type_is_sanitized() {
        let name = method_symbol("List", "Append", &["Array[Integer]".to_string()]);
        assert_eq!(name, "@List_Append__Array_Integer_");
    }

    #[test]
    fn zero_arg_constructor_has_no_trailing_separator_per_param() {
        let name = ctor_symbol("Counter", &[]);
        assert_eq!(name, "@Counter_ctor");
    }
}
