//! Surface component
//!
//! Binds a geometry, a material and an effect to its node. While attached,
//! their providers live in the node's store under the `geometry`,
//! `material` and `effect` collections.

use crate::data::{EFFECT_COLLECTION, GEOMETRY_COLLECTION, MATERIAL_COLLECTION};
use crate::data::Provider;
use crate::error::SceneResult;
use crate::foundation::{Signal, Uuid};
use crate::render::{Effect, Geometry, Material, Variables, DEFAULT_TECHNIQUE};
use crate::scene::{Component, ComponentBase, Node};
use std::cell::RefCell;
use std::rc::Rc;

/// Payload of surface change signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceEvent {
    /// Surface that changed
    pub surface: Uuid,
}

/// Drawable binding of geometry, material and effect
pub struct Surface {
    base: ComponentBase,
    uuid: Uuid,
    name: String,
    geometry: RefCell<Rc<Geometry>>,
    material: RefCell<Rc<Material>>,
    effect: RefCell<Rc<Effect>>,
    technique: RefCell<String>,
    geometry_changed: Signal<SurfaceEvent>,
    material_changed: Signal<SurfaceEvent>,
    effect_changed: Signal<SurfaceEvent>,
    technique_changed: Signal<SurfaceEvent>,
}

impl Surface {
    /// Surface using the `default` technique
    pub fn new(
        name: impl Into<String>,
        geometry: Rc<Geometry>,
        material: Rc<Material>,
        effect: Rc<Effect>,
    ) -> Rc<Self> {
        Self::with_technique(name, geometry, material, effect, DEFAULT_TECHNIQUE)
    }

    /// Surface using an explicit technique
    pub fn with_technique(
        name: impl Into<String>,
        geometry: Rc<Geometry>,
        material: Rc<Material>,
        effect: Rc<Effect>,
        technique: impl Into<String>,
    ) -> Rc<Self> {
        Rc::new(Self {
            base: ComponentBase::new(),
            uuid: Uuid::new(),
            name: name.into(),
            geometry: RefCell::new(geometry),
            material: RefCell::new(material),
            effect: RefCell::new(effect),
            technique: RefCell::new(technique.into()),
            geometry_changed: Signal::new(),
            material_changed: Signal::new(),
            effect_changed: Signal::new(),
            technique_changed: Signal::new(),
        })
    }

    /// Surface identifier
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Surface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound geometry
    pub fn geometry(&self) -> Rc<Geometry> {
        Rc::clone(&self.geometry.borrow())
    }

    /// Bound material
    pub fn material(&self) -> Rc<Material> {
        Rc::clone(&self.material.borrow())
    }

    /// Bound effect
    pub fn effect(&self) -> Rc<Effect> {
        Rc::clone(&self.effect.borrow())
    }

    /// Requested technique
    pub fn technique(&self) -> String {
        self.technique.borrow().clone()
    }

    /// Variables substituted into the effect's binding templates
    pub fn variables(&self) -> Variables {
        let mut variables = Variables::new();
        variables.insert("surfaceUuid".into(), self.uuid.to_string());
        variables.insert("geometryUuid".into(), self.geometry.borrow().uuid().to_string());
        variables.insert("materialUuid".into(), self.material.borrow().uuid().to_string());
        variables.insert("effectUuid".into(), self.effect.borrow().uuid().to_string());
        variables
    }

    /// Swap the geometry
    pub fn set_geometry(&self, geometry: Rc<Geometry>) -> SceneResult<()> {
        let previous = self.geometry();
        if Rc::ptr_eq(&previous, &geometry) {
            return Ok(());
        }
        self.swap_provider(previous.data(), geometry.data(), GEOMETRY_COLLECTION)?;
        *self.geometry.borrow_mut() = geometry;
        self.geometry_changed.execute(&self.event())
    }

    /// Swap the material
    pub fn set_material(&self, material: Rc<Material>) -> SceneResult<()> {
        let previous = self.material();
        if Rc::ptr_eq(&previous, &material) {
            return Ok(());
        }
        self.swap_provider(previous.data(), material.data(), MATERIAL_COLLECTION)?;
        *self.material.borrow_mut() = material;
        self.material_changed.execute(&self.event())
    }

    /// Swap the effect
    pub fn set_effect(&self, effect: Rc<Effect>) -> SceneResult<()> {
        let previous = self.effect();
        if Rc::ptr_eq(&previous, &effect) {
            return Ok(());
        }
        self.swap_provider(previous.data(), effect.data(), EFFECT_COLLECTION)?;
        *self.effect.borrow_mut() = effect;
        self.effect_changed.execute(&self.event())
    }

    /// Change the requested technique
    pub fn set_technique(&self, technique: impl Into<String>) -> SceneResult<()> {
        let technique = technique.into();
        if *self.technique.borrow() == technique {
            return Ok(());
        }
        *self.technique.borrow_mut() = technique;
        self.technique_changed.execute(&self.event())
    }

    /// Replace `previous` with `next` in the target store
    ///
    /// On failure the store is left holding `previous`.
    fn swap_provider(&self, previous: &Rc<Provider>, next: &Rc<Provider>, collection: &str) -> SceneResult<()> {
        let Some(target) = self.base.target() else {
            return Ok(());
        };
        let store = target.data();
        store.remove_provider(previous, Some(collection))?;
        if let Err(err) = store.add_provider(next, Some(collection)) {
            if store.has_provider(next, Some(collection)) {
                store.remove_provider(next, Some(collection))?;
            }
            store.add_provider(previous, Some(collection))?;
            return Err(err);
        }
        Ok(())
    }

    const fn event(&self) -> SurfaceEvent {
        SurfaceEvent { surface: self.uuid }
    }

    /// Fired after the geometry is swapped
    pub const fn geometry_changed(&self) -> &Signal<SurfaceEvent> {
        &self.geometry_changed
    }

    /// Fired after the material is swapped
    pub const fn material_changed(&self) -> &Signal<SurfaceEvent> {
        &self.material_changed
    }

    /// Fired after the effect is swapped
    pub const fn effect_changed(&self) -> &Signal<SurfaceEvent> {
        &self.effect_changed
    }

    /// Fired after the technique changes
    pub const fn technique_changed(&self) -> &Signal<SurfaceEvent> {
        &self.technique_changed
    }
}

impl Component for Surface {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn target_added(&self, target: &Node) -> SceneResult<()> {
        let data = target.data();
        data.add_provider(self.geometry().data(), Some(GEOMETRY_COLLECTION))?;
        data.add_provider(self.material().data(), Some(MATERIAL_COLLECTION))?;
        data.add_provider(self.effect().data(), Some(EFFECT_COLLECTION))
    }

    fn target_removed(&self, target: &Node) -> SceneResult<()> {
        let data = target.data();
        data.remove_provider(self.geometry().data(), Some(GEOMETRY_COLLECTION))?;
        data.remove_provider(self.material().data(), Some(MATERIAL_COLLECTION))?;
        data.remove_provider(self.effect().data(), Some(EFFECT_COLLECTION))
    }

    fn type_name(&self) -> &'static str {
        "Surface"
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("technique", &*self.technique.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn surface() -> Rc<Surface> {
        let material = Material::new("red");
        material.set("diffuseColor", 1.0_f32).unwrap();
        Surface::new("s", Geometry::new("g"), material, Effect::new("e"))
    }

    #[test]
    fn test_registers_providers_while_attached() {
        let node = Node::new("mesh");
        let surface = surface();
        let key = format!("material[{}].diffuseColor", surface.material().uuid());

        node.add_component(surface.clone()).unwrap();
        assert!(node.data().has_property(&key));

        node.remove_component(&surface).unwrap();
        assert!(!node.data().has_property(&key));
        assert!(node.data().providers().is_empty());
    }

    #[test]
    fn test_set_material_reregisters() {
        let node = Node::new("mesh");
        let surface = surface();
        node.add_component(surface.clone()).unwrap();

        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _slot = surface.material_changed().connect(move |_| { f.set(f.get() + 1); Ok(()) });

        let blue = Material::new("blue");
        blue.set("diffuseColor", 0.5_f32).unwrap();
        surface.set_material(blue.clone()).unwrap();
        surface.set_material(blue.clone()).unwrap();

        assert_eq!(fired.get(), 1);
        let key = format!("material[{}].diffuseColor", blue.uuid());
        assert_eq!(node.data().get_as::<f32>(&key).unwrap(), 0.5);
        assert_eq!(surface.variables()["materialUuid"], blue.uuid().to_string());
    }

    #[test]
    fn test_failed_swap_keeps_previous_material() {
        let node = Node::new("mesh");
        let surface = surface();
        node.add_component(surface.clone()).unwrap();
        let red = surface.material();
        node.data().remove_provider(red.data(), Some(MATERIAL_COLLECTION)).unwrap();

        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _slot = surface.material_changed().connect(move |_| { f.set(f.get() + 1); Ok(()) });

        let blue = Material::new("blue");
        assert!(surface.set_material(blue.clone()).is_err());
        assert!(Rc::ptr_eq(&surface.material(), &red));
        assert!(!node.data().has_provider(blue.data(), Some(MATERIAL_COLLECTION)));
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_rejected_registration_restores_previous_geometry() {
        let node = Node::new("mesh");
        let surface = surface();
        node.add_component(surface.clone()).unwrap();
        let previous = surface.geometry();

        let next = Geometry::new("next");
        let uuid = next.data().uuid();
        let _veto = node.data().provider_added().connect(move |e| {
            if e.provider.uuid() == uuid {
                Err(crate::SceneError::Backend("rejected".into()))
            } else {
                Ok(())
            }
        });

        assert!(surface.set_geometry(next.clone()).is_err());
        assert!(Rc::ptr_eq(&surface.geometry(), &previous));
        assert!(node.data().has_provider(previous.data(), Some(GEOMETRY_COLLECTION)));
        assert!(!node.data().has_provider(next.data(), Some(GEOMETRY_COLLECTION)));
    }

    #[test]
    fn test_technique_change_fires_once() {
        let surface = surface();
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _slot = surface.technique_changed().connect(move |_| { f.set(f.get() + 1); Ok(()) });

        surface.set_technique("shadowed").unwrap();
        surface.set_technique("shadowed").unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(surface.technique(), "shadowed");
    }
}
