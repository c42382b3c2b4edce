/// Construct a map [`Value`][crate::Value] using a JSON-like syntax.
///
/// Keys are identifiers or string literals, values are nested lists `[..]`,
/// nested maps `{..}`, `None`, or any expression with a `From` conversion
/// into a value.
///
/// ```
/// let state = strand::value! {
///     title: "Todos",
///     todos: [
///         { text: "Write docs", done: false },
///         { text: "Ship it", done: true },
///     ],
///     "filter-by": None,
/// };
/// assert_eq!(state.get("title"), Some(&strand::Value::from("Todos")));
/// ```
// Heavily based on `serde_json::json!`
#[macro_export]
macro_rules! value {
    ($($tt:tt)*) => {
        $crate::_value!({ $($tt)* })
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! _value {
    //////////////////////////////////////////////////////////////////////////
    // TT muncher for parsing the inside of a list [...]. Produces a vec of
    // the elements.
    //
    // Must be invoked as: _value!(@list [] $($tt)*)
    //////////////////////////////////////////////////////////////////////////

    // Done with trailing comma.
    (@list [$($elems:expr,)*]) => {
        $crate::_value_vec![$($elems,)*]
    };

    // Done without trailing comma.
    (@list [$($elems:expr),*]) => {
        $crate::_value_vec![$($elems),*]
    };

    // Next element is `None`.
    (@list [$($elems:expr,)*] None $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!(None)] $($rest)*)
    };

    // Next element is a list.
    (@list [$($elems:expr,)*] [$($list:tt)*] $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!([$($list)*])] $($rest)*)
    };

    // Next element is a map.
    (@list [$($elems:expr,)*] {$($map:tt)*} $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!({$($map)*})] $($rest)*)
    };

    // Next element is an expression followed by comma.
    (@list [$($elems:expr,)*] $next:expr, $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!($next),] $($rest)*)
    };

    // Last element is an expression with no trailing comma.
    (@list [$($elems:expr,)*] $last:expr) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!($last)])
    };

    // Comma after the most recent element.
    (@list [$($elems:expr),*] , $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)*] $($rest)*)
    };

    // Unexpected token after most recent element.
    (@list [$($elems:expr),*] $unexpected:tt $($rest:tt)*) => {
        $crate::_value_unexpected!($unexpected)
    };

    //////////////////////////////////////////////////////////////////////////
    // TT muncher for parsing the inside of a map {...}. Each entry is
    // inserted into the given map variable.
    //
    // Must be invoked as: _value!(@map $map () ($($tt)*) ($($tt)*))
    //
    // Two copies of the input tokens are kept so that we can match on one
    // copy and trigger errors on the other copy.
    //////////////////////////////////////////////////////////////////////////

    // Done.
    (@map $map:ident () () ()) => {};

    // Insert the current entry followed by trailing comma.
    (@map $map:ident [$key:tt] ($value:expr) , $($rest:tt)*) => {
        let _ = $map.insert($crate::_value_key!($key), $value);
        $crate::_value!(@map $map () ($($rest)*) ($($rest)*));
    };

    // Current entry followed by unexpected token.
    (@map $map:ident [$key:tt] ($value:expr) $unexpected:tt $($rest:tt)*) => {
        $crate::_value_unexpected!($unexpected);
    };

    // Insert the last entry without trailing comma.
    (@map $map:ident [$key:tt] ($value:expr)) => {
        let _ = $map.insert($crate::_value_key!($key), $value);
    };

    // Next value is `None`.
    (@map $map:ident ($key:tt) (: None $($rest:tt)*) $copy:tt) => {
        $crate::_value!(@map $map [$key] ($crate::_value!(None)) $($rest)*);
    };

    // Next value is a list.
    (@map $map:ident ($key:tt) (: [$($list:tt)*] $($rest:tt)*) $copy:tt) => {
        $crate::_value!(@map $map [$key] ($crate::_value!([$($list)*])) $($rest)*);
    };

    // Next value is a map.
    (@map $map:ident ($key:tt) (: {$($mapping:tt)*} $($rest:tt)*) $copy:tt) => {
        $crate::_value!(@map $map [$key] ($crate::_value!({$($mapping)*})) $($rest)*);
    };

    // Next value is an expression followed by comma.
    (@map $map:ident ($key:tt) (: $value:expr , $($rest:tt)*) $copy:tt) => {
        $crate::_value!(@map $map [$key] ($crate::_value!($value)) , $($rest)*);
    };

    // Last value is an expression with no trailing comma.
    (@map $map:ident ($key:tt) (: $value:expr) $copy:tt) => {
        $crate::_value!(@map $map [$key] ($crate::_value!($value)));
    };

    // Missing value for last entry. Trigger a reasonable error message.
    (@map $map:ident ($key:tt) (:) $copy:tt) => {
        // "unexpected end of macro invocation"
        $crate::_value!();
    };

    // Missing colon and value for last entry. Trigger a reasonable error
    // message.
    (@map $map:ident ($key:tt) () $copy:tt) => {
        // "unexpected end of macro invocation"
        $crate::_value!();
    };

    // Misplaced colon. Trigger a reasonable error message.
    (@map $map:ident () (: $($rest:tt)*) ($colon:tt $($copy:tt)*)) => {
        // Takes no arguments so "no rules expected the token `:`".
        $crate::_value_unexpected!($colon);
    };

    // Found a comma inside a key. Trigger a reasonable error message.
    (@map $map:ident ($($key:tt)*) (, $($rest:tt)*) ($comma:tt $($copy:tt)*)) => {
        // Takes no arguments so "no rules expected the token `,`".
        $crate::_value_unexpected!($comma);
    };

    // Key is fully parenthesized.
    (@map $map:ident () (($key:expr) : $($rest:tt)*) $copy:tt) => {
        $crate::_value!(@map $map ($key) (: $($rest)*) (: $($rest)*));
    };

    // Munch a token into the current key.
    (@map $map:ident ($($key:tt)*) ($tt:tt $($rest:tt)*) $copy:tt) => {
        $crate::_value!(@map $map ($($key)* $tt) ($($rest)*) ($($rest)*));
    };

    //////////////////////////////////////////////////////////////////////////
    // The main implementation.
    //////////////////////////////////////////////////////////////////////////
    (None) => {
        $crate::Value::None
    };

    ([]) => {
        $crate::Value::List(::std::rc::Rc::new($crate::_value_vec![]))
    };

    ([ $($tt:tt)+ ]) => {
        $crate::Value::List(::std::rc::Rc::new($crate::_value!(@list [] $($tt)+)))
    };

    ({}) => {
        $crate::Value::Map(::std::rc::Rc::new($crate::Map::new()))
    };

    ({ $($tt:tt)+ }) => {
        $crate::Value::Map(::std::rc::Rc::new({
            let mut map = $crate::Map::new();
            $crate::_value!(@map map () ($($tt)+) ($($tt)+));
            map
        }))
    };

    // Default to `From` implementation.
    ($other:expr) => {
        $crate::Value::from($other)
    };
}

// Invoke vec here instead of in the muncher so that it always resolves to
// the standard library macro.
#[macro_export]
#[doc(hidden)]
macro_rules! _value_vec {
    ($($content:tt)*) => {
        ::std::vec![$($content)*]
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! _value_key {
    ($key:literal) => {
        ::std::string::String::from($key)
    };
    ($key:ident) => {
        ::std::string::String::from(stringify!($key))
    };
    ($key:expr) => {
        ::std::string::String::from($key)
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! _value_unexpected {
    () => {};
}

#[cfg(test)]
mod tests {
    use crate::{List, Map, Value};

    #[test]
    fn value_empty() {
        assert_eq!(value! {}, Value::new_map());
    }

    #[test]
    fn value_list() {
        let v = value! { xs: ["testing...", None, {}, []] };
        assert_eq!(
            v.get("xs").unwrap(),
            &Value::from([
                Value::from("testing..."),
                Value::None,
                Value::from(Map::new()),
                Value::from(List::new()),
            ])
        )
    }

    #[test]
    fn value_map() {
        let v = value! { x: "hello" };
        let exp = Value::from_iter([("x", "hello")]);
        assert_eq!(v, exp);

        let v = value! { x: "hello", };
        assert_eq!(v, exp);

        let v = value! { x: "hello", y: String::from("world!") };
        let exp = Value::from_iter([("x", "hello"), ("y", "world!")]);
        assert_eq!(v, exp);
    }

    #[test]
    fn value_map_literal_and_expr_keys() {
        let key = "computed";
        let v = value! { "data-id": 1, (key): 2 };
        let exp = Value::from_iter([("data-id", 1), ("computed", 2)]);
        assert_eq!(v, exp);
    }

    #[test]
    fn value_map_nested_keeps_order() {
        let v = value! {
            w: "hello",
            x: {
                z: "world!",
                y: -1,
            },
        };
        let x = v.get("x").unwrap().as_map().unwrap();
        let keys: Vec<_> = x.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "y"]);
        assert_eq!(x["y"], Value::Integer(-1));
    }
}
