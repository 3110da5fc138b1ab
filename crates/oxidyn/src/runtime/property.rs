//! Property descriptors.
//!
//! A property is a name plus an opaque attribute string (for example
//! `T@"NSString",C,N,V_name`). The runtime stores both as given and never
//! parses the attributes.

use super::{ClassHandle, Runtime};
use crate::error::{Error, Result};
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

struct PropertyRecord {
    name: Box<str>,
    attributes: Box<str>,
    owner: ClassHandle,
}

/// A declared property. Clones share one descriptor.
#[derive(Clone)]
pub struct Property(Arc<PropertyRecord>);

impl Property {
    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Attribute string, stored as given.
    #[must_use]
    pub fn attributes(&self) -> &str {
        &self.0.attributes
    }

    /// The class that declared this property.
    #[must_use]
    pub fn owner(&self) -> ClassHandle {
        self.0.owner
    }

    /// Opaque pointer to the shared descriptor. It stays valid for as long
    /// as the runtime, which never drops a declared property.
    pub(crate) fn as_raw(&self) -> *const c_void {
        Arc::as_ptr(&self.0).cast()
    }

    /// Rebuilds a `Property` from [`as_raw`](Self::as_raw).
    ///
    /// # Safety
    ///
    /// `raw` must come from `as_raw` on a property that is still alive.
    pub(crate) unsafe fn from_raw(raw: *const c_void) -> Self {
        let raw = raw.cast::<PropertyRecord>();
        // SAFETY: as for `Ivar::from_raw`.
        unsafe {
            Arc::increment_strong_count(raw);
            Self(Arc::from_raw(raw))
        }
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Property {}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name())
            .field("attributes", &self.attributes())
            .finish()
    }
}

impl Runtime {
    /// Declares a property on a draft class.
    ///
    /// # Errors
    ///
    /// - [`Error::SealedClass`] if `class` is registered
    /// - [`Error::DuplicateProperty`] if `class` already declares `name`
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oxidyn::Runtime;
    ///
    /// let rt = Runtime::new();
    /// let person = rt.allocate_class_pair(None, "Person", 0).unwrap();
    /// rt.add_property(person, "name", "T@\"NSString\",C").unwrap();
    ///
    /// let name = rt.get_property(person, "name").unwrap();
    /// assert_eq!(name.attributes(), "T@\"NSString\",C");
    /// ```
    pub fn add_property(&self, class: ClassHandle, name: &str, attributes: &str) -> Result<Property> {
        let record = self.record(class);
        let _draft = record.lock_draft()?;

        let mut properties = record.properties().write();
        if properties.iter().any(|property| property.name() == name) {
            return Err(Error::DuplicateProperty {
                class: record.name().to_owned(),
                property: name.to_owned(),
            });
        }

        let property = Property(Arc::new(PropertyRecord {
            name: name.into(),
            attributes: attributes.into(),
            owner: class,
        }));
        properties.push(property.clone());
        Ok(property)
    }

    /// Finds a property declared by `class` itself. Ancestors are not
    /// searched.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn get_property(&self, class: ClassHandle, name: &str) -> Option<Property> {
        self.record(class)
            .properties()
            .read()
            .iter()
            .find(|property| property.name() == name)
            .cloned()
    }

    /// Returns the class's own properties in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn copy_property_list(&self, class: ClassHandle) -> Box<[Property]> {
        self.record(class).properties().read().iter().cloned().collect()
    }
}
