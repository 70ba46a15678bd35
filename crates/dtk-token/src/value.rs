#![forbid(unsafe_code)]

//! Token value entries and their CSS string form.

use std::fmt;
use std::rc::Rc;

use dtk_dom::Element;

use crate::TokenError;
use crate::token::DesignToken;

/// Function computing a token value for the requesting element.
pub type DeriveFn<T> = Rc<dyn Fn(&Element) -> Result<T, TokenError>>;

/// What a token holds at one element.
pub enum TokenValue<T> {
    /// A fixed value.
    Static(T),
    /// Evaluated lazily for each requesting element; reads it performs become
    /// dependencies.
    Derived(DeriveFn<T>),
}

impl<T> TokenValue<T> {
    /// Fallible derived value.
    pub fn derived(f: impl Fn(&Element) -> Result<T, TokenError> + 'static) -> Self {
        Self::Derived(Rc::new(f))
    }

    /// Infallible derived value.
    pub fn computed(f: impl Fn(&Element) -> T + 'static) -> Self {
        Self::Derived(Rc::new(move |el| Ok(f(el))))
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived(_))
    }
}

impl<T: Clone + 'static> TokenValue<T> {
    /// Follow another token: resolves to `other`'s value at the same element.
    #[must_use]
    pub fn alias(other: &DesignToken<T>) -> Self {
        let other = other.clone();
        Self::derived(move |el| other.get_value_for(el))
    }
}

impl<T: Clone> Clone for TokenValue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(v) => Self::Static(v.clone()),
            Self::Derived(f) => Self::Derived(Rc::clone(f)),
        }
    }
}

impl<T> From<T> for TokenValue<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for TokenValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// String written into a CSS custom property for a token value.
pub trait CssValue {
    fn to_css(&self) -> String;
}

macro_rules! css_via_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CssValue for $ty {
                fn to_css(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

css_via_display!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
    String, &'static str,
);

impl CssValue for Rc<str> {
    fn to_css(&self) -> String {
        self.as_ref().to_owned()
    }
}
