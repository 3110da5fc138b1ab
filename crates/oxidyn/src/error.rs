//! Error types for the `OxideDyn` runtime.
//!
//! Every fallible runtime operation returns [`Result`]. Lookups of unknown
//! names are not errors; they return `None`. Invalid [`ClassHandle`]s are
//! precondition violations and panic instead.
//!
//! [`ClassHandle`]: crate::ClassHandle

use thiserror::Error;

/// Errors that can occur in the `OxideDyn` runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A class with this name is already published.
    #[error("class '{name}' already exists")]
    DuplicateName {
        /// The contested class name.
        name: String,
    },

    /// The class is registered and its layout can no longer change.
    #[error("class '{class}' is registered and can no longer be modified")]
    SealedClass {
        /// The registered class.
        class: String,
    },

    /// The class pair was registered before.
    #[error("class '{class}' is already registered")]
    AlreadyRegistered {
        /// The registered class.
        class: String,
    },

    /// An ivar of this name exists on the class or one of its ancestors.
    #[error("ivar '{ivar}' already exists on '{class}' or one of its superclasses")]
    DuplicateIvar {
        /// The class being extended.
        class: String,
        /// The contested ivar name.
        ivar: String,
    },

    /// A property of this name exists on the class.
    #[error("property '{property}' already exists on '{class}'")]
    DuplicateProperty {
        /// The class being extended.
        class: String,
        /// The contested property name.
        property: String,
    },

    /// An ivar declared an alignment that is not a power of two.
    #[error("ivar '{ivar}' of '{class}' has invalid alignment {alignment}")]
    InvalidAlignment {
        /// The class being registered.
        class: String,
        /// The offending ivar.
        ivar: String,
        /// The declared alignment.
        alignment: usize,
    },

    /// The instance size of the class does not fit in memory.
    #[error("instance layout of '{class}' overflows")]
    LayoutOverflow {
        /// The class being registered.
        class: String,
    },

    /// Storage for an instance or a class record could not be obtained.
    #[error("cannot allocate '{class}': {reason}")]
    AllocationFailure {
        /// The class being instantiated or allocated.
        class: String,
        /// Human-readable cause.
        reason: &'static str,
    },

    /// The requested superclass is still a draft.
    #[error("superclass '{superclass}' of '{class}' is not registered")]
    SuperclassNotRegistered {
        /// The class being allocated.
        class: String,
        /// The unregistered superclass.
        superclass: String,
    },

    /// A metaclass was passed where a class was expected.
    #[error("cannot subclass metaclass '{superclass}' when allocating '{class}'")]
    MetaclassAsSuperclass {
        /// The class being allocated.
        class: String,
        /// The metaclass passed as superclass.
        superclass: String,
    },

    /// The selector handle was not issued by this runtime.
    #[error("unknown selector handle {id}")]
    UnknownSelector {
        /// Raw selector ID.
        id: u32,
    },

    /// A process-wide runtime is already installed.
    #[error("a global runtime is already installed")]
    AlreadyInstalled,
}

/// Result type for `OxideDyn` operations.
pub type Result<T> = std::result::Result<T, Error>;
