//! Foreign keys and the navigations that hang off them.
//!
//! A navigation is not stored on its declaring entity type. It lives on one end of a
//! foreign key: `dependent_to_principal` is declared on the dependent and targets the
//! principal, `principal_to_dependent` the other way round. The two ends of one
//! foreign key are each other's inverse.

use super::{EntityTypeId, ForeignKeyId, Model, PropertyId};
use crate::source::ConfigurationSource;

/// A named navigation on one end of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub name: String,
    pub source: ConfigurationSource,
}

impl Navigation {
    pub fn new(name: impl Into<String>, source: ConfigurationSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Which end of a foreign key a navigation sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NavigationEnd {
    /// Declared on the dependent, pointing at the principal.
    DependentToPrincipal,
    /// Declared on the principal, pointing at the dependent.
    PrincipalToDependent,
}

impl NavigationEnd {
    pub const fn inverse(self) -> Self {
        match self {
            NavigationEnd::DependentToPrincipal => NavigationEnd::PrincipalToDependent,
            NavigationEnd::PrincipalToDependent => NavigationEnd::DependentToPrincipal,
        }
    }
}

/// Handle to a navigation: a foreign key plus an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NavigationRef {
    pub foreign_key: ForeignKeyId,
    pub end: NavigationEnd,
}

/// A relationship from dependent properties to the principal's primary key.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub(crate) dependent: EntityTypeId,
    pub(crate) principal: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) properties_source: Option<ConfigurationSource>,
    pub(crate) dependent_to_principal: Option<Navigation>,
    pub(crate) principal_to_dependent: Option<Navigation>,
    pub(crate) is_unique: bool,
    pub(crate) is_unique_source: Option<ConfigurationSource>,
    pub(crate) is_required: bool,
    pub(crate) is_required_source: Option<ConfigurationSource>,
    pub(crate) is_ownership: bool,
    pub(crate) is_ownership_source: Option<ConfigurationSource>,
    pub(crate) principal_end_source: Option<ConfigurationSource>,
    pub(crate) source: ConfigurationSource,
}

impl ForeignKey {
    /// A relationship with no properties and no navigations yet.
    pub fn new(
        dependent: EntityTypeId,
        principal: EntityTypeId,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            dependent,
            principal,
            properties: Vec::new(),
            properties_source: None,
            dependent_to_principal: None,
            principal_to_dependent: None,
            is_unique: false,
            is_unique_source: None,
            is_required: false,
            is_required_source: None,
            is_ownership: false,
            is_ownership_source: None,
            principal_end_source: None,
            source,
        }
    }

    pub fn dependent(&self) -> EntityTypeId {
        self.dependent
    }

    pub fn principal(&self) -> EntityTypeId {
        self.principal
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn properties_source(&self) -> Option<ConfigurationSource> {
        self.properties_source
    }

    pub fn dependent_to_principal(&self) -> Option<&Navigation> {
        self.dependent_to_principal.as_ref()
    }

    pub fn principal_to_dependent(&self) -> Option<&Navigation> {
        self.principal_to_dependent.as_ref()
    }

    pub fn navigation(&self, end: NavigationEnd) -> Option<&Navigation> {
        match end {
            NavigationEnd::DependentToPrincipal => self.dependent_to_principal.as_ref(),
            NavigationEnd::PrincipalToDependent => self.principal_to_dependent.as_ref(),
        }
    }

    /// Whether neither end carries a navigation.
    pub fn has_no_navigations(&self) -> bool {
        self.dependent_to_principal.is_none() && self.principal_to_dependent.is_none()
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique
    }

    pub fn is_unique_source(&self) -> Option<ConfigurationSource> {
        self.is_unique_source
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn is_required_source(&self) -> Option<ConfigurationSource> {
        self.is_required_source
    }

    pub fn is_ownership(&self) -> bool {
        self.is_ownership
    }

    pub fn is_ownership_source(&self) -> Option<ConfigurationSource> {
        self.is_ownership_source
    }

    /// Set once the dependent/principal direction has been decided; `None` means the
    /// direction is still ambiguous.
    pub fn principal_end_source(&self) -> Option<ConfigurationSource> {
        self.principal_end_source
    }

    pub fn source(&self) -> ConfigurationSource {
        self.source
    }

    /// The entity type that declares the navigation at `end`.
    pub fn declaring_type(&self, end: NavigationEnd) -> EntityTypeId {
        match end {
            NavigationEnd::DependentToPrincipal => self.dependent,
            NavigationEnd::PrincipalToDependent => self.principal,
        }
    }

    /// The entity type the navigation at `end` points to.
    pub fn target_type(&self, end: NavigationEnd) -> EntityTypeId {
        self.declaring_type(end.inverse())
    }

    pub fn update_source(&mut self, source: ConfigurationSource) {
        self.source = source.max_with(Some(self.source));
    }

    pub fn set_navigation(&mut self, end: NavigationEnd, navigation: Option<Navigation>) {
        match end {
            NavigationEnd::DependentToPrincipal => self.dependent_to_principal = navigation,
            NavigationEnd::PrincipalToDependent => self.principal_to_dependent = navigation,
        }
    }

    pub fn set_unique(&mut self, unique: bool, source: ConfigurationSource) -> bool {
        if !source.overrides(self.is_unique_source) {
            return false;
        }
        self.is_unique = unique;
        self.is_unique_source = Some(source.max_with(self.is_unique_source));
        true
    }

    pub fn set_required(&mut self, required: bool, source: ConfigurationSource) -> bool {
        if !source.overrides(self.is_required_source) {
            return false;
        }
        self.is_required = required;
        self.is_required_source = Some(source.max_with(self.is_required_source));
        true
    }

    pub fn set_ownership(&mut self, ownership: bool, source: ConfigurationSource) -> bool {
        if !source.overrides(self.is_ownership_source) {
            return false;
        }
        self.is_ownership = ownership;
        self.is_ownership_source = Some(source.max_with(self.is_ownership_source));
        true
    }

    pub fn set_principal_end_source(&mut self, source: ConfigurationSource) {
        self.principal_end_source = Some(source.max_with(self.principal_end_source));
    }

    /// Replace the dependent properties; the caller keeps the declaring type's
    /// property list consistent.
    pub fn set_properties(&mut self, properties: Vec<PropertyId>, source: Option<ConfigurationSource>) {
        self.properties = properties;
        self.properties_source = source;
    }

    /// Swap dependent and principal, moving each navigation to the opposite end.
    /// Properties are cleared since they belonged to the old dependent.
    pub(crate) fn invert(&mut self) {
        std::mem::swap(&mut self.dependent, &mut self.principal);
        std::mem::swap(
            &mut self.dependent_to_principal,
            &mut self.principal_to_dependent,
        );
        self.properties.clear();
        self.properties_source = None;
    }
}

/// Read-only view of one navigation.
#[derive(Debug, Clone, Copy)]
pub struct NavigationView<'a> {
    reference: NavigationRef,
    foreign_key: &'a ForeignKey,
    navigation: &'a Navigation,
}

impl<'a> NavigationView<'a> {
    pub(crate) fn new(model: &'a Model, reference: NavigationRef) -> Option<Self> {
        let foreign_key = model.foreign_key(reference.foreign_key)?;
        let navigation = foreign_key.navigation(reference.end)?;
        Some(Self {
            reference,
            foreign_key,
            navigation,
        })
    }

    pub fn reference(&self) -> NavigationRef {
        self.reference
    }

    pub fn name(&self) -> &'a str {
        &self.navigation.name
    }

    pub fn source(&self) -> ConfigurationSource {
        self.navigation.source
    }

    pub fn foreign_key(&self) -> &'a ForeignKey {
        self.foreign_key
    }

    pub fn declaring_type(&self) -> EntityTypeId {
        self.foreign_key.declaring_type(self.reference.end)
    }

    pub fn target_type(&self) -> EntityTypeId {
        self.foreign_key.target_type(self.reference.end)
    }

    pub fn is_dependent_to_principal(&self) -> bool {
        self.reference.end == NavigationEnd::DependentToPrincipal
    }

    /// A principal-to-dependent navigation of a non-unique foreign key.
    pub fn is_collection(&self) -> bool {
        !self.is_dependent_to_principal() && !self.foreign_key.is_unique
    }

    /// The navigation on the other end, if any.
    pub fn inverse(&self) -> Option<NavigationRef> {
        let end = self.reference.end.inverse();
        self.foreign_key.navigation(end).map(|_| NavigationRef {
            foreign_key: self.reference.foreign_key,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaId;
    use ConfigurationSource::{Convention, Explicit};

    #[test]
    fn test_invert_swaps_ends() {
        let a = EntityTypeId::from_index(0);
        let b = EntityTypeId::from_index(1);
        let mut fk = ForeignKey::new(a, b, Convention);
        fk.set_navigation(
            NavigationEnd::DependentToPrincipal,
            Some(Navigation::new("B", Convention)),
        );
        fk.set_properties(vec![PropertyId::from_index(3)], Some(Convention));
        fk.invert();

        assert_eq!(fk.dependent(), b);
        assert_eq!(fk.principal(), a);
        assert!(fk.dependent_to_principal().is_none());
        assert_eq!(fk.principal_to_dependent().map(|n| n.name.as_str()), Some("B"));
        assert_eq!(fk.declaring_type(NavigationEnd::PrincipalToDependent), a);
        assert!(fk.properties().is_empty());
    }

    #[test]
    fn test_required_respects_source() {
        let mut fk = ForeignKey::new(EntityTypeId::from_index(0), EntityTypeId::from_index(1), Convention);
        assert!(fk.set_required(true, Explicit));
        assert!(!fk.set_required(false, Convention));
        assert!(fk.is_required());
    }
}
