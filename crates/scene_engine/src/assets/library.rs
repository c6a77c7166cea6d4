//! Named resource registry
//!
//! The library maps names to effects, geometries, materials and textures,
//! and owns the graphics context handle shared by every renderer of a
//! scene. Missing assets can be produced on demand by an [`AssetLoader`].

use crate::error::{SceneError, SceneResult};
use crate::render::{ContextHandle, Effect, Geometry, Material, Texture};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// External source of assets
pub trait AssetLoader {
    /// Produce `name` and register it into `library`
    fn load(&self, name: &str, library: &AssetLibrary) -> SceneResult<()>;
}

/// Registry of named assets plus the shared graphics context
pub struct AssetLibrary {
    context: ContextHandle,
    effects: RefCell<HashMap<String, Rc<Effect>>>,
    geometries: RefCell<HashMap<String, Rc<Geometry>>>,
    materials: RefCell<HashMap<String, Rc<Material>>>,
    textures: RefCell<HashMap<String, Rc<Texture>>>,
    loader: RefCell<Option<Rc<dyn AssetLoader>>>,
}

macro_rules! asset_accessors {
    ($($field:ident: $ty:ty => $set:ident, $get:ident, $fetch:ident;)*) => {
        $(
            #[doc = concat!("Register a ", stringify!($ty), " under `name`, replacing any previous one")]
            pub fn $set(&self, name: impl Into<String>, asset: Rc<$ty>) {
                self.$field.borrow_mut().insert(name.into(), asset);
            }

            #[doc = concat!(stringify!($ty), " registered under `name`")]
            pub fn $get(&self, name: &str) -> Option<Rc<$ty>> {
                self.$field.borrow().get(name).cloned()
            }

            #[doc = concat!(stringify!($ty), " registered under `name`, failing if absent")]
            pub fn $fetch(&self, name: &str) -> SceneResult<Rc<$ty>> {
                self.$get(name).ok_or_else(|| SceneError::AssetNotFound(name.to_string()))
            }
        )*
    };
}

impl AssetLibrary {
    /// Empty library around `context`
    pub fn new(context: ContextHandle) -> Rc<Self> {
        Rc::new(Self {
            context,
            effects: RefCell::new(HashMap::new()),
            geometries: RefCell::new(HashMap::new()),
            materials: RefCell::new(HashMap::new()),
            textures: RefCell::new(HashMap::new()),
            loader: RefCell::new(None),
        })
    }

    /// Shared graphics context
    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    asset_accessors! {
        effects: Effect => set_effect, effect, get_effect;
        geometries: Geometry => set_geometry, geometry, get_geometry;
        materials: Material => set_material, material, get_material;
        textures: Texture => set_texture, texture, get_texture;
    }

    /// Install the loader used by [`load`](Self::load)
    pub fn set_loader(&self, loader: Rc<dyn AssetLoader>) {
        *self.loader.borrow_mut() = Some(loader);
    }

    /// Ask the loader to produce `name`
    pub fn load(&self, name: &str) -> SceneResult<()> {
        let loader = self
            .loader
            .borrow()
            .clone()
            .ok_or_else(|| SceneError::NoAssetLoader(name.to_string()))?;
        log::debug!("asset library: loading '{}'", name);
        loader.load(name, self)
    }

    /// Effect `name`, loading it first if it is not registered yet
    pub fn effect_or_load(&self, name: &str) -> SceneResult<Rc<Effect>> {
        if let Some(effect) = self.effect(name) {
            return Ok(effect);
        }
        self.load(name)?;
        self.get_effect(name)
    }
}

impl std::fmt::Debug for AssetLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLibrary")
            .field("effects", &self.effects.borrow().len())
            .field("geometries", &self.geometries.borrow().len())
            .field("materials", &self.materials.borrow().len())
            .field("textures", &self.textures.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Pass, RecordingContext};

    struct BasicEffects;

    impl AssetLoader for BasicEffects {
        fn load(&self, name: &str, library: &AssetLibrary) -> SceneResult<()> {
            if name != "basic" {
                return Err(SceneError::AssetNotFound(name.to_string()));
            }
            library.set_effect(name, Effect::with_passes(name, [Pass::new("basic", "basic")]));
            Ok(())
        }
    }

    fn library() -> Rc<AssetLibrary> {
        let (_, context) = RecordingContext::shared(64, 64);
        AssetLibrary::new(context)
    }

    #[test]
    fn test_lookup_by_name() {
        let assets = library();
        assets.set_material("red", Material::new("red"));
        assert!(assets.material("red").is_some());
        assert!(matches!(assets.get_geometry("quad"), Err(SceneError::AssetNotFound(_))));
    }

    #[test]
    fn test_load_without_loader_fails() {
        let assets = library();
        assert!(matches!(assets.load("basic"), Err(SceneError::NoAssetLoader(_))));
    }

    #[test]
    fn test_effect_or_load() {
        let assets = library();
        assets.set_loader(Rc::new(BasicEffects));
        let effect = assets.effect_or_load("basic").unwrap();
        assert!(Rc::ptr_eq(&effect, &assets.get_effect("basic").unwrap()));
        assert!(assets.effect_or_load("phong").is_err());
    }
}
