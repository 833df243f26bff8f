//! The default builtin catalog.

use crate::builtins::Builtin;
use crate::types::{Function, Type};

/// Builtins that partial evaluation must not precompute: their results
/// depend on the clock, the network or fresh randomness.
pub const IGNORE_DURING_PARTIAL_EVAL: &[&str] = &["time.now_ns", "http.send", "uuid.rfc4122"];

fn a() -> Type {
    Type::any()
}

fn b() -> Type {
    Type::Boolean
}

fn n() -> Type {
    Type::Number
}

fn s() -> Type {
    Type::String
}

fn null() -> Type {
    Type::Null
}

fn any(types: Vec<Type>) -> Type {
    Type::any_of(types)
}

fn arr(elem: Type) -> Type {
    Type::array_of(elem)
}

fn tuple(types: Vec<Type>) -> Type {
    Type::tuple(types)
}

fn set(elem: Type) -> Type {
    Type::set_of(elem)
}

fn obj(key: Type, value: Type) -> Type {
    Type::object_of(key, value)
}

fn def(name: &str, args: Vec<Type>, result: Type) -> Builtin {
    Builtin::new(name, Function::new(args, result))
}

fn array_or_set(elem: Type) -> Type {
    any(vec![arr(elem.clone()), set(elem)])
}

fn json_paths() -> Type {
    let path = any(vec![s(), arr(a())]);
    any(vec![arr(path.clone()), set(path)])
}

fn keys_operand() -> Type {
    any(vec![arr(a()), set(a()), obj(a(), a())])
}

fn time_operand() -> Type {
    any(vec![n(), tuple(vec![n(), s()])])
}

fn cidr_operand() -> Type {
    let cidr = any(vec![s(), arr(a())]);
    any(vec![s(), arr(cidr.clone()), set(cidr.clone()), obj(s(), cidr)])
}

fn comparison(name: &str, infix: &str, description: &str) -> Builtin {
    def(name, vec![a(), a()], b())
        .with_infix(infix)
        .documented("comparisons", description)
}

fn arithmetic(name: &str, infix: &str, description: &str) -> Builtin {
    def(name, vec![n(), n()], n())
        .with_infix(infix)
        .documented("numbers", description)
}

fn string_predicate(name: &str, description: &str) -> Builtin {
    def(name, vec![s(), s()], b()).documented("strings", description)
}

fn string_transform(name: &str, description: &str) -> Builtin {
    def(name, vec![s(), s()], s()).documented("strings", description)
}

fn unary(name: &str, arg: Type, result: Type) -> Builtin {
    def(name, vec![arg], result)
}

fn jwt_verify(name: &str) -> Builtin {
    def(name, vec![s(), s()], b())
}

/// Returns the default catalog in registration order.
pub fn default_builtins() -> Vec<Builtin> {
    vec![
        // Unification and assignment.
        def("eq", vec![a(), a()], b()).with_infix("="),
        def("assign", vec![a(), a()], b()).with_infix(":="),
        // Comparisons.
        comparison("gt", ">", "``x`` is greater than ``y``"),
        comparison("gte", ">=", "``x`` is greater than or equal to ``y``"),
        comparison("lt", "<", "``x`` is less than ``y``"),
        comparison("lte", "<=", "``x`` is less than or equal to ``y``"),
        comparison("neq", "!=", "``x`` is not equal to ``y``"),
        comparison("equal", "==", "``x`` is equal to ``y``"),
        // Arithmetic.
        arithmetic("plus", "+", "``z`` is the sum of ``x`` and ``y``"),
        def(
            "minus",
            vec![any(vec![n(), set(a())]), any(vec![n(), set(a())])],
            any(vec![n(), set(a())]),
        )
        .with_infix("-")
        .documented("numbers", "``z`` is the difference of ``x`` and ``y``"),
        arithmetic("mul", "*", "``z`` is the product of ``x`` and ``y``"),
        arithmetic("div", "/", "``z`` is the quotient of ``x`` and ``y``"),
        arithmetic("rem", "%", "``z`` is the remainder from the division of ``x`` and ``y``"),
        unary("round", n(), n())
            .documented("numbers", "``output`` is ``x`` rounded to the nearest integer"),
        unary("abs", n(), n()).documented("numbers", "``output`` is the absolute value of ``x``"),
        // Bitwise arithmetic.
        def("bits.or", vec![n(), n()], n()),
        def("bits.and", vec![n(), n()], n()),
        unary("bits.negate", n(), n()),
        def("bits.xor", vec![n(), n()], n()),
        def("bits.lsh", vec![n(), n()], n()),
        def("bits.rsh", vec![n(), n()], n()),
        // Set operators.
        def("and", vec![set(a()), set(a())], set(a()))
            .with_infix("&")
            .documented("sets", "``z`` is the intersection of ``x`` and ``y``"),
        def("or", vec![set(a()), set(a())], set(a()))
            .with_infix("|")
            .documented("sets", "``z`` is the union of ``x`` and ``y``"),
        // Aggregates.
        unary(
            "count",
            any(vec![arr(a()), set(a()), obj(a(), a()), s()]),
            n(),
        )
        .documented(
            "aggregates",
            "``output`` is the length of the array, set, object or string provided as input",
        ),
        unary("sum", array_or_set(n()), n())
            .documented("aggregates", "``output`` is the sum of the numbers in ``array_or_set``"),
        unary("product", array_or_set(n()), n()).documented(
            "aggregates",
            "``output`` is the product of the numbers in ``array_or_set``",
        ),
        unary("max", array_or_set(a()), a())
            .documented("aggregates", "``output`` is the maximum value in ``array_or_set``"),
        unary("min", array_or_set(a()), a())
            .documented("aggregates", "``output`` is the minimum value in ``array_or_set``"),
        unary("any", array_or_set(a()), b()).documented(
            "aggregates",
            "``output`` is ``true`` if any of the values in ``array_or_set`` is ``true``. A collection of length 0 returns ``false``",
        ),
        unary("all", array_or_set(a()), b()).documented(
            "aggregates",
            "``output`` is ``true`` if all of the values in ``array_or_set`` are ``true``. A collection of length 0 returns ``true``",
        ),
        // Arrays.
        def("array.concat", vec![arr(a()), arr(a())], arr(a())).documented(
            "arrays",
            "``output`` is the result of concatenating the two input arrays together",
        ),
        def("array.slice", vec![arr(a()), n(), n()], arr(a())).documented(
            "arrays",
            "``output`` is the part of the ``array`` starting from index ``x`` to ``y`` including the first index but excluding the last. If `x >= y` then `output == []`. If both `x` and `y` are less than zero, `output == []`. Otherwise, `x` and `y` are clamped to 0 and `count(array)` respectively",
        ),
        // Conversions.
        unary("to_number", any(vec![n(), s(), b(), null()]), n()),
        // Casts (deprecated).
        unary("cast_object", a(), obj(a(), a())),
        unary("cast_null", a(), null()),
        unary("cast_boolean", a(), b()),
        unary("cast_string", a(), s()),
        unary("cast_set", a(), set(a())),
        unary("cast_array", a(), arr(a())),
        // Regular expressions.
        unary("regex.is_valid", s(), b()),
        def("regex.match", vec![s(), s()], b()),
        def("re_match", vec![s(), s()], b()),
        def("regex.split", vec![s(), s()], arr(s())),
        def("regex.globs_match", vec![s(), s()], b()),
        def("regex.template_match", vec![s(), s(), s(), s()], b()),
        def("regex.find_n", vec![s(), s(), n()], arr(s())),
        def("regex.find_all_string_submatch_n", vec![s(), s(), n()], arr(arr(s()))),
        // Sets.
        def("set_diff", vec![set(a()), set(a())], set(a())).documented(
            "sets",
            "``z`` is the difference between ``x`` and ``y``, i.e., the elements in ``x`` that are not in ``y``",
        ),
        unary("intersection", set(set(a())), set(a()))
            .documented("sets", "``output`` is the intersection of the sets in the input set"),
        unary("union", set(set(a())), set(a()))
            .documented("sets", "``output`` is the union of the sets in the input set"),
        // Strings.
        def("concat", vec![s(), array_or_set(s())], s()).documented(
            "strings",
            "`output` is the result of joining together the elements of `array_or_set` with the delimiter specified by string `x`",
        ),
        string_predicate("contains", "true if string `x` contains `y`"),
        string_predicate("startswith", "true if string `x` begins with `y`"),
        string_predicate("endswith", "true if string `x` ends with `y`"),
        def("format_int", vec![n(), n()], s()).documented(
            "strings",
            "`output` is string representation of number `x` in the given base `y`",
        ),
        def("indexof", vec![s(), s()], n()).documented(
            "strings",
            "`output` is the index inside string `x` where `y` first occurs, or -1 if `y` does not exist",
        ),
        def("substring", vec![s(), n(), n()], s()).documented(
            "strings",
            "`output` is the portion of string `x` from index `y` and having a length of `z`. If `z` is less than zero, `z` is the remainder of the string. If index `y` is greater than the length of the string, `output` is empty. It is invalid to pass a negative offset to this function.",
        ),
        unary("lower", s(), s())
            .documented("strings", "`output` is string `x` after converting to lower case"),
        unary("upper", s(), s())
            .documented("strings", "`output` is string `x` after converting to upper case"),
        def("split", vec![s(), s()], arr(s())).documented(
            "strings",
            "`output` is `array[string]` representing elements of string `x` separated by delimiter `y`",
        ),
        def("replace", vec![s(), s(), s()], s()).documented(
            "strings",
            "`output` is a `string` representing string `x` with all instances of `y` replaced by `z`",
        ),
        def("strings.replace_n", vec![obj(s(), s()), s()], s()).documented(
            "strings",
            "`object` is an object with old, new string key value pairs (e.g. {\"old1\": \"new1\", \"old2\": \"new2\", ...}). `output` is a `string` with all old strings inside `object` replaced by the new strings",
        ),
        string_transform(
            "trim",
            "`output` is a string representing string `x` with all leading and trailing instances of the characters in `y` removed",
        ),
        string_transform(
            "trim_left",
            "`output` is a string representing string `x` with all leading instances of the characters in `y` removed",
        ),
        string_transform(
            "trim_prefix",
            "`output` is a `string` representing string `x` with leading instance of prefix `y` removed. If `x` doesn't start with `y`, `x` is returned unchanged",
        ),
        string_transform(
            "trim_right",
            "`output` is a string representing string `x` with all trailing instances of the characters in `y` removed",
        ),
        string_transform(
            "trim_suffix",
            "`output` is a `string` representing string `x` with trailing instance of suffix `y` removed. If `x` doesn't end with `y`, `x` is returned unchanged",
        ),
        unary("trim_space", s(), s()).documented(
            "strings",
            "`output` is a `string` representing string `x` with all leading and trailing white space removed",
        ),
        def("sprintf", vec![s(), arr(a())], s()).documented(
            "strings",
            "`output` is a string representing string `x` formatted by the values in `array`",
        ),
        // Numbers.
        def("numbers.range", vec![n(), n()], arr(n())).documented(
            "numbers",
            "``output`` is the range of integer numbers between ``x`` and ``y`` (inclusive). If ``x`` == ``y`` then ``output`` == ``[x]``. If ``x`` < ``y`` the range is in ascending order. If ``x`` > ``y`` the range is in descending order.",
        ),
        // Encoding.
        unary("json.marshal", a(), s()),
        unary("json.unmarshal", s(), a()),
        unary("json.is_valid", s(), b()),
        unary("base64.encode", s(), s()),
        unary("base64.decode", s(), s()),
        unary("base64.is_valid", s(), b()),
        unary("base64url.encode", s(), s()),
        unary("base64url.encode_no_pad", s(), s()),
        unary("base64url.decode", s(), s()),
        unary("urlquery.decode", s(), s()),
        unary("urlquery.encode", s(), s()),
        unary(
            "urlquery.encode_object",
            obj(s(), any(vec![s(), arr(s()), set(s())])),
            s(),
        ),
        unary("urlquery.decode_object", s(), obj(s(), arr(s()))),
        unary("yaml.marshal", a(), s()),
        unary("yaml.unmarshal", s(), a()),
        unary("yaml.is_valid", s(), b()),
        unary("hex.encode", s(), s()),
        unary("hex.decode", s(), s()),
        // Object manipulation.
        def("object.get", vec![obj(a(), a()), a(), a()], a()).documented(
            "objects",
            "`output` is the value stored by the `object` at key `x`. If no value is found, the default value `y` is returned",
        ),
        def("object.remove", vec![obj(a(), a()), keys_operand()], a()).documented(
            "objects",
            "`output` is a new object which is the result of removing the keys specified in `array_or_set_or_object` from `object`. The keys must be either an array, set, or object of keys",
        ),
        def("object.union", vec![obj(a(), a()), obj(a(), a())], a()).documented(
            "objects",
            "`output` is a new object which is the result of an asymmetric recursive union of two objects where conflicts are resolved by choosing the key from the right-hand object. For example: `object.union({\"a\": 1, \"b\": 2, \"c\": {\"d\": 3}}, {\"a\": 7, \"c\": {\"d\": 4, \"e\": 5}})` will result in `{\"a\": 7, \"b\": 2, \"c\": {\"d\": 4, \"e\": 5}}`",
        ),
        def("object.filter", vec![obj(a(), a()), keys_operand()], a()).documented(
            "objects",
            "`output` is a new object with the remaining data from `object` with only keys specified in `array_or_set_or_object` which is an array, set, or object of keys. For example: `object.filter({\"a\": {\"b\": \"x\", \"c\": \"y\"}, \"d\": \"z\"}, [\"a\"])` will result in `{\"a\": {\"b\": \"x\", \"c\": \"y\"}}`)",
        ),
        // JSON object manipulation.
        def("json.filter", vec![obj(a(), a()), json_paths()], a()).documented(
            "objects",
            "`output` is the remaining data from `object` with only keys specified in `array_or_set` which is an array or set of JSON string paths. For example: `json.filter({\"a\": {\"b\": \"x\", \"c\": \"y\"}}, [\"a/b\"])` will result in `{\"a\": {\"b\": \"x\"}}`). Paths are not filtered in-order and are deduplicated before being evaluated",
        ),
        def("json.remove", vec![obj(a(), a()), json_paths()], a()).documented(
            "objects",
            "`output` is a new object which is the result of removing all keys specified in `array_or_set` which is an array or set of JSON string paths. For example: `json.remove({\"a\": {\"b\": \"x\", \"c\": \"y\"}}, [\"a/b\"])` will result in `{\"a\": {\"c\": \"y\"}}`. Paths are not removed in-order and are deduplicated before being evaluated",
        ),
        // Tokens.
        unary(
            "io.jwt.decode",
            s(),
            tuple(vec![obj(a(), a()), obj(a(), a()), s()]),
        ),
        jwt_verify("io.jwt.verify_rs256"),
        jwt_verify("io.jwt.verify_rs384"),
        jwt_verify("io.jwt.verify_rs512"),
        jwt_verify("io.jwt.verify_ps256"),
        jwt_verify("io.jwt.verify_ps384"),
        jwt_verify("io.jwt.verify_ps512"),
        jwt_verify("io.jwt.verify_es256"),
        jwt_verify("io.jwt.verify_es384"),
        jwt_verify("io.jwt.verify_es512"),
        jwt_verify("io.jwt.verify_hs256"),
        jwt_verify("io.jwt.verify_hs384"),
        jwt_verify("io.jwt.verify_hs512"),
        def(
            "io.jwt.decode_verify",
            vec![s(), obj(s(), a())],
            tuple(vec![b(), obj(a(), a()), obj(a(), a())]),
        ),
        def("io.jwt.encode_sign_raw", vec![s(), s(), s()], s()),
        def(
            "io.jwt.encode_sign",
            vec![obj(s(), a()), obj(s(), a()), obj(s(), a())],
            s(),
        ),
        // Time.
        def("time.now_ns", vec![], n()),
        def("time.parse_ns", vec![s(), s()], n()),
        unary("time.parse_rfc3339_ns", s(), n()),
        unary("time.parse_duration_ns", s(), n()),
        unary("time.date", time_operand(), tuple(vec![n(), n(), n()])),
        unary("time.clock", time_operand(), tuple(vec![n(), n(), n()])),
        unary("time.weekday", time_operand(), s()),
        def("time.add_date", vec![n(), n(), n(), n()], n()),
        // Crypto.
        unary(
            "crypto.x509.parse_certificates",
            s(),
            arr(obj(s(), a())),
        ),
        unary("crypto.md5", s(), s()),
        unary("crypto.sha1", s(), s()),
        unary("crypto.sha256", s(), s()),
        unary(
            "crypto.x509.parse_certificate_request",
            s(),
            obj(s(), a()),
        ),
        // Graphs.
        unary("walk", a(), tuple(vec![arr(a()), a()])).relation(),
        def(
            "graph.reachable",
            vec![obj(a(), array_or_set(a())), array_or_set(a())],
            set(a()),
        ),
        // Sort.
        unary("sort", array_or_set(a()), arr(a())).documented(
            "aggregates",
            "``output`` is the sorted ``array`` containing elements from ``array_or_set``",
        ),
        // Types.
        unary("is_number", a(), b()),
        unary("is_string", a(), b()),
        unary("is_boolean", a(), b()),
        unary("is_array", a(), b()),
        unary("is_set", a(), b()),
        unary("is_object", a(), b()),
        unary("is_null", a(), b()),
        unary("type_name", any(vec![a()]), s()),
        // HTTP.
        unary("http.send", obj(s(), a()), obj(a(), a())),
        // Policy parsing.
        def("rego.parse_module", vec![s(), s()], obj(s(), a())),
        // Runtime information.
        def("opa.runtime", vec![], obj(s(), a())),
        // Tracing.
        unary("trace", s(), b()),
        // CIDR.
        def("net.cidr_overlap", vec![s(), s()], b()),
        def("net.cidr_intersects", vec![s(), s()], b()),
        def("net.cidr_contains", vec![s(), s()], b()),
        def(
            "net.cidr_contains_matches",
            vec![cidr_operand(), cidr_operand()],
            set(tuple(vec![a(), a()])),
        ),
        unary("net.cidr_expand", s(), set(s())),
        unary("net.cidr_merge", any(vec![arr(any(vec![s()])), set(s())]), set(s())),
        // Glob.
        def("glob.match", vec![s(), arr(s()), s()], b()),
        unary("glob.quote_meta", s(), s()),
        // Units.
        unary("units.parse_bytes", s(), n()),
        // UUIDs.
        unary("uuid.rfc4122", s(), s()),
        // Semantic versions.
        unary("semver.is_valid", a(), b()),
        def("semver.compare", vec![s(), s()], n()),
    ]
}
