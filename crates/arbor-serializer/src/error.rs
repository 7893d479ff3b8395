use thiserror::Error;

pub type MarshalResult<T> = Result<T, MarshalError>;
pub type UnmarshalResult<T> = Result<T, UnmarshalError>;

/// Failure while turning a host value into JSON. Surfaces as bridge
/// failure code 593 unless noted otherwise.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("circular reference")]
    CircularReference,

    #[error("no serializer can marshal a {0:?} value")]
    NoSerializer(crate::types::SourceKind),

    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<MarshalError>,
    },

    #[error("map key {key}: {source}")]
    Key {
        key: String,
        #[source]
        source: Box<MarshalError>,
    },

    #[error("bean {class} property {property}: {source}")]
    Property {
        class: String,
        property: String,
        #[source]
        source: Box<MarshalError>,
    },

    #[error("bean instance is not a {0}")]
    WrongInstanceType(String),

    #[error("{0}")]
    Custom(String),
}

impl MarshalError {
    pub fn custom(message: impl Into<String>) -> Self {
        MarshalError::Custom(message.into())
    }

    pub fn element(index: usize, source: MarshalError) -> Self {
        MarshalError::Element {
            index,
            source: Box::new(source),
        }
    }

    pub fn key(key: impl Into<String>, source: MarshalError) -> Self {
        MarshalError::Key {
            key: key.into(),
            source: Box::new(source),
        }
    }

    pub fn property(class: &str, property: &str, source: MarshalError) -> Self {
        MarshalError::Property {
            class: class.to_string(),
            property: property.to_string(),
            source: Box::new(source),
        }
    }
}

/// Failure while turning JSON into a host value. Surfaces as bridge
/// failure code 592 (or 594 for fixup data problems).
#[derive(Debug, Error)]
pub enum UnmarshalError {
    #[error("no type hint")]
    NoTypeHint,

    #[error("could not resolve class: {0}")]
    ClassNotResolved(String),

    #[error("not a number")]
    NotANumber,

    #[error("number is too large for {0}")]
    NumberTooLarge(&'static str),

    #[error("number is not an integer")]
    NotAnInteger,

    #[error("not a {expected}: {got}")]
    WrongJsonKind { expected: &'static str, got: String },

    #[error("{0} missing")]
    MissingField(&'static str),

    #[error("unknown constant {constant} for enum {class}")]
    UnknownConstant { class: String, constant: String },

    #[error("could not instantiate bean of type {0}, make sure it has a registered constructor")]
    NoConstructor(String),

    #[error("bean {0} has no matches")]
    NoPropertyMatches(String),

    #[error("bean instance is not a {0}")]
    WrongInstanceType(String),

    #[error("no serializer can unmarshal to {0}")]
    NoSerializer(String),

    #[error("invalid or unexpected data in fixups: {0}")]
    BadFixups(String),

    #[error("couldn't find local arg resolver")]
    NoContextResolver,

    #[error("error resolving local argument: {0}")]
    ContextArg(String),

    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<UnmarshalError>,
    },

    #[error("key {key}: {source}")]
    Key {
        key: String,
        #[source]
        source: Box<UnmarshalError>,
    },

    #[error("bean {class} property {property}: {source}")]
    Property {
        class: String,
        property: String,
        #[source]
        source: Box<UnmarshalError>,
    },

    #[error("arg {index}: {source}")]
    Argument {
        index: usize,
        #[source]
        source: Box<UnmarshalError>,
    },

    #[error("{0}")]
    Custom(String),
}

impl UnmarshalError {
    pub fn custom(message: impl Into<String>) -> Self {
        UnmarshalError::Custom(message.into())
    }

    pub fn wrong_kind(expected: &'static str, got: &serde_json::Value) -> Self {
        UnmarshalError::WrongJsonKind {
            expected,
            got: got.to_string(),
        }
    }

    pub fn element(index: usize, source: UnmarshalError) -> Self {
        UnmarshalError::Element {
            index,
            source: Box::new(source),
        }
    }

    pub fn key(key: impl Into<String>, source: UnmarshalError) -> Self {
        UnmarshalError::Key {
            key: key.into(),
            source: Box::new(source),
        }
    }

    pub fn property(class: &str, property: &str, source: UnmarshalError) -> Self {
        UnmarshalError::Property {
            class: class.to_string(),
            property: property.to_string(),
            source: Box::new(source),
        }
    }

    pub fn argument(index: usize, source: UnmarshalError) -> Self {
        UnmarshalError::Argument {
            index,
            source: Box::new(source),
        }
    }

    /// Fixup-data failures map to a distinct bridge code (594).
    pub fn is_fixup_error(&self) -> bool {
        let mut err = self;
        loop {
            match err {
                UnmarshalError::BadFixups(_) => return true,
                UnmarshalError::Element { source, .. }
                | UnmarshalError::Key { source, .. }
                | UnmarshalError::Property { source, .. }
                | UnmarshalError::Argument { source, .. } => err = source.as_ref(),
                _ => return false,
            }
        }
    }
}
