//! Draw call pool
//!
//! Owns every draw call of one renderer, grouped per surface, and the order
//! they are drawn in.

use super::context::GraphicsContext;
use super::draw_call::{DataBindings, DrawCall, ProgramResolver, TargetState, VariantKeyResolver};
use super::effect::{Effect, Variables};
use crate::error::{SceneError, SceneResult};
use crate::foundation::Uuid;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use std::rc::Rc;

new_key_type! {
    /// Handle to the draw calls built for one surface
    pub struct DrawCallGroupId;
    /// Handle to one draw call
    pub struct DrawCallKey;
}

/// Pool activity counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Groups created
    pub adds: u64,
    /// Groups destroyed
    pub removes: u64,
    /// Groups rebound
    pub invalidations: u64,
    /// Sorts performed
    pub sorts: u64,
}

#[derive(Debug)]
struct DrawCallGroup {
    surface: Uuid,
    technique: String,
    signature: String,
    draw_calls: Vec<DrawCallKey>,
}

fn signature(variables: &Variables) -> String {
    variables
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Draw calls of one renderer and their order
pub struct DrawCallPool {
    draw_calls: SlotMap<DrawCallKey, DrawCall>,
    groups: SlotMap<DrawCallGroupId, DrawCallGroup>,
    by_surface: HashMap<Uuid, DrawCallGroupId>,
    order: Vec<DrawCallKey>,
    resolver: Box<dyn ProgramResolver>,
    needs_sort: bool,
    stats: PoolStats,
}

impl DrawCallPool {
    /// Empty pool using [`VariantKeyResolver`]
    pub fn new() -> Self {
        Self::with_resolver(Box::new(VariantKeyResolver))
    }

    /// Empty pool using a custom program resolver
    pub fn with_resolver(resolver: Box<dyn ProgramResolver>) -> Self {
        Self {
            draw_calls: SlotMap::with_key(),
            groups: SlotMap::with_key(),
            by_surface: HashMap::new(),
            order: Vec::new(),
            resolver,
            needs_sort: false,
            stats: PoolStats::default(),
        }
    }

    /// Build one draw call per pass of the resolved technique
    pub fn add_draw_calls(
        &mut self,
        surface: Uuid,
        effect: &Rc<Effect>,
        technique: &str,
        variables: Variables,
        data: DataBindings,
    ) -> SceneResult<DrawCallGroupId> {
        if self.by_surface.contains_key(&surface) {
            return Err(SceneError::SurfaceAlreadyTracked(surface));
        }
        let (technique, resolved) = effect.resolve_technique(technique)?;

        let mut keys = Vec::with_capacity(resolved.passes.len());
        for pass in &resolved.passes {
            let draw_call = DrawCall::new(
                surface,
                Rc::clone(effect),
                technique.clone(),
                Rc::clone(pass),
                variables.clone(),
                data.clone(),
                self.resolver.as_ref(),
            );
            let key = self.draw_calls.insert(draw_call);
            self.order.push(key);
            keys.push(key);
        }

        let id = self.groups.insert(DrawCallGroup {
            surface,
            technique,
            signature: signature(&variables),
            draw_calls: keys,
        });
        self.by_surface.insert(surface, id);
        self.needs_sort = true;
        self.stats.adds += 1;
        log::debug!("draw call pool: surface {} added ({} passes)", surface, resolved.passes.len());
        Ok(id)
    }

    /// Destroy a group; stale ids are ignored
    pub fn remove_draw_calls(&mut self, id: DrawCallGroupId) {
        let Some(group) = self.groups.remove(id) else {
            log::trace!("draw call pool: ignoring stale group {:?}", id);
            return;
        };
        for key in &group.draw_calls {
            self.draw_calls.remove(*key);
        }
        self.order.retain(|key| self.draw_calls.contains_key(*key));
        self.by_surface.remove(&group.surface);
        self.stats.removes += 1;
        log::debug!("draw call pool: surface {} removed", group.surface);
    }

    /// Rebind a group with new variables, keeping its keys and positions
    pub fn invalidate_draw_calls(&mut self, id: DrawCallGroupId, variables: Variables) {
        let Some(group) = self.groups.get_mut(id) else {
            log::trace!("draw call pool: ignoring stale group {:?}", id);
            return;
        };
        group.signature = signature(&variables);
        for key in &group.draw_calls {
            if let Some(draw_call) = self.draw_calls.get_mut(*key) {
                draw_call.rebind(variables.clone(), self.resolver.as_ref());
            }
        }
        self.needs_sort = true;
        self.stats.invalidations += 1;
        log::trace!("draw call pool: surface {} invalidated", group.surface);
    }

    /// Re-resolve draw calls whose bound keys changed
    pub fn update(&mut self) {
        let resolver = self.resolver.as_ref();
        for draw_call in self.draw_calls.values_mut().filter(|d| d.is_dirty()) {
            let before = (draw_call.priority(), draw_call.z_sorted());
            draw_call.bind(resolver);
            if before != (draw_call.priority(), draw_call.z_sorted()) || draw_call.z_sorted() {
                self.needs_sort = true;
            }
        }
    }

    /// Order draw calls for drawing
    ///
    /// Higher priority first; within a priority opaque before z-sorted,
    /// opaque near to far and z-sorted far to near. The sort is stable.
    pub fn sort_draw_calls(&mut self) {
        let draw_calls = &self.draw_calls;
        let depths: HashMap<DrawCallKey, f32> = self
            .order
            .iter()
            .filter_map(|key| draw_calls.get(*key).map(|d| (*key, d.depth())))
            .collect();

        self.order.sort_by(|a, b| {
            let (da, db) = (&draw_calls[*a], &draw_calls[*b]);
            let (za, zb) = (depths[a], depths[b]);
            db.priority()
                .total_cmp(&da.priority())
                .then(da.z_sorted().cmp(&db.z_sorted()))
                .then_with(|| if da.z_sorted() { zb.total_cmp(&za) } else { za.total_cmp(&zb) })
        });
        self.needs_sort = false;
        self.stats.sorts += 1;
    }

    /// Render every draw call in order
    pub fn render(&self, context: &mut dyn GraphicsContext, restore: TargetState) -> SceneResult<()> {
        for draw_call in self.draw_calls() {
            draw_call.render(context, restore)?;
        }
        Ok(())
    }

    /// Draw calls in draw order
    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> {
        self.order.iter().filter_map(|key| self.draw_calls.get(*key))
    }

    /// Draw calls of one group, in pass order
    pub fn group_draw_calls(&self, id: DrawCallGroupId) -> Vec<&DrawCall> {
        self.groups
            .get(id)
            .map(|g| g.draw_calls.iter().filter_map(|k| self.draw_calls.get(*k)).collect())
            .unwrap_or_default()
    }

    /// Keys in draw order
    pub fn order(&self) -> &[DrawCallKey] {
        &self.order
    }

    /// Group tracking `surface`
    pub fn group_of(&self, surface: Uuid) -> Option<DrawCallGroupId> {
        self.by_surface.get(&surface).copied()
    }

    /// Technique a group resolved to
    pub fn group_technique(&self, id: DrawCallGroupId) -> Option<&str> {
        self.groups.get(id).map(|g| g.technique.as_str())
    }

    /// Variable signature a group was last bound with
    pub fn group_signature(&self, id: DrawCallGroupId) -> Option<&str> {
        self.groups.get(id).map(|g| g.signature.as_str())
    }

    /// Destroy everything
    pub fn clear(&mut self) {
        self.draw_calls.clear();
        self.groups.clear();
        self.by_surface.clear();
        self.order.clear();
        self.needs_sort = false;
    }

    /// Whether groups were added or invalidated since the last sort
    pub const fn needs_sort(&self) -> bool {
        self.needs_sort
    }

    /// Number of live groups
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Number of live draw calls
    pub fn len(&self) -> usize {
        self.draw_calls.len()
    }

    /// True when the pool holds no draw call
    pub fn is_empty(&self) -> bool {
        self.draw_calls.is_empty()
    }

    /// Activity counters
    pub const fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl Default for DrawCallPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DrawCallPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawCallPool")
            .field("groups", &self.groups.len())
            .field("draw_calls", &self.draw_calls.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Provider, Store, Value, MATERIAL_COLLECTION};
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::draw_call::MODEL_TO_WORLD;
    use crate::render::effect::{Binding, Pass, Technique};

    struct Scene {
        root: Rc<Store>,
        renderer: Rc<Store>,
    }

    impl Scene {
        fn new() -> Self {
            Self { root: Store::new(), renderer: Store::new() }
        }

        fn object(&self, z: f32) -> DataBindings {
            let target = Store::new();
            let transform = Provider::with_values([(MODEL_TO_WORLD, Mat4::new_translation(&Vec3::new(0.0, 0.0, z)))]);
            target.add_provider(&transform, None).unwrap();
            DataBindings { root: Rc::clone(&self.root), renderer: Rc::clone(&self.renderer), target }
        }
    }

    fn effect(z_sorted: bool, priority: f32) -> Rc<Effect> {
        Effect::with_passes("e", [Pass::new("p", "basic").z_sorted(z_sorted).with_priority(priority)])
    }

    fn surfaces(pool: &DrawCallPool) -> Vec<Uuid> {
        pool.draw_calls().map(DrawCall::surface).collect()
    }

    #[test]
    fn test_add_twice_fails() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let surface = Uuid::new();
        let e = effect(false, 0.0);

        pool.add_draw_calls(surface, &e, "default", Variables::new(), scene.object(0.0)).unwrap();
        assert!(matches!(
            pool.add_draw_calls(surface, &e, "default", Variables::new(), scene.object(0.0)),
            Err(SceneError::SurfaceAlreadyTracked(_))
        ));
        assert_eq!(pool.num_groups(), 1);
    }

    #[test]
    fn test_one_draw_call_per_pass() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let effect = Effect::new("multi");
        effect.add_technique(
            "default",
            Technique::new([Pass::new("depth", "depth"), Pass::new("color", "color")]),
        );

        let id = pool.add_draw_calls(Uuid::new(), &effect, "default", Variables::new(), scene.object(0.0)).unwrap();
        let passes: Vec<&str> = pool.group_draw_calls(id).iter().map(|d| d.pass_name()).collect();
        assert_eq!(passes, vec!["depth", "color"]);
    }

    #[test]
    fn test_missing_technique_fails() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let effect = Effect::new("empty");
        assert!(matches!(
            pool.add_draw_calls(Uuid::new(), &effect, "default", Variables::new(), scene.object(0.0)),
            Err(SceneError::TechniqueNotFound { .. })
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_remove_and_stale_ids() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let surface = Uuid::new();
        let e = effect(false, 0.0);

        let id = pool.add_draw_calls(surface, &e, "default", Variables::new(), scene.object(0.0)).unwrap();
        pool.remove_draw_calls(id);
        pool.remove_draw_calls(id);

        assert!(pool.is_empty());
        assert!(pool.order().is_empty());
        assert_eq!(pool.stats().removes, 1);
        pool.add_draw_calls(surface, &e, "default", Variables::new(), scene.object(0.0)).unwrap();
    }

    #[test]
    fn test_sort_order() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let far_opaque = Uuid::new();
        let near_opaque = Uuid::new();
        let far_blend = Uuid::new();
        let near_blend = Uuid::new();
        let background = Uuid::new();

        let opaque = effect(false, 10.0);
        let blended = effect(true, 10.0);
        pool.add_draw_calls(near_blend, &blended, "default", Variables::new(), scene.object(-1.0)).unwrap();
        pool.add_draw_calls(far_opaque, &opaque, "default", Variables::new(), scene.object(-9.0)).unwrap();
        pool.add_draw_calls(background, &effect(false, 0.0), "default", Variables::new(), scene.object(-1.0)).unwrap();
        pool.add_draw_calls(far_blend, &blended, "default", Variables::new(), scene.object(-9.0)).unwrap();
        pool.add_draw_calls(near_opaque, &opaque, "default", Variables::new(), scene.object(-1.0)).unwrap();

        assert!(pool.needs_sort());
        pool.sort_draw_calls();
        assert!(!pool.needs_sort());
        let expected = vec![near_opaque, far_opaque, far_blend, near_blend, background];
        assert_eq!(surfaces(&pool), expected);

        pool.sort_draw_calls();
        assert_eq!(surfaces(&pool), expected);
        assert_eq!(pool.stats().sorts, 2);
    }

    #[test]
    fn test_invalidate_keeps_keys_and_order() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let pass = Pass::new("p", "basic").uniform("uColor", Binding::target("material[${materialUuid}].color"));
        let effect = Effect::with_passes("e", [pass]);

        let data = scene.object(0.0);
        let first = Provider::with_values([("color", 1.0_f32)]);
        let second = Provider::with_values([("color", 2.0_f32)]);
        data.target.add_provider(&first, Some(MATERIAL_COLLECTION)).unwrap();
        data.target.add_provider(&second, Some(MATERIAL_COLLECTION)).unwrap();

        let mut vars = Variables::new();
        vars.insert("materialUuid".into(), first.uuid().to_string());
        let other = pool.add_draw_calls(Uuid::new(), &effect, "default", vars.clone(), scene.object(0.0)).unwrap();
        let id = pool.add_draw_calls(Uuid::new(), &effect, "default", vars, data).unwrap();
        let order = pool.order().to_vec();

        let mut vars = Variables::new();
        vars.insert("materialUuid".into(), second.uuid().to_string());
        pool.invalidate_draw_calls(id, vars);

        assert_eq!(pool.order(), order.as_slice());
        assert_eq!(pool.group_draw_calls(id)[0].uniform("uColor"), Some(&Value::Float(2.0)));
        assert!(pool.group_draw_calls(other)[0].uniform("uColor").is_none());
        assert_eq!(pool.stats().invalidations, 1);
        assert_eq!(pool.stats().adds, 2);
    }

    #[test]
    fn test_update_rebinds_dirty_draw_calls() {
        let scene = Scene::new();
        let mut pool = DrawCallPool::new();
        let pass = Pass::new("p", "basic").uniform("uTime", Binding::root("time"));
        let effect = Effect::with_passes("e", [pass]);
        let clock = Provider::with_values([("time", 0.0_f32)]);
        scene.root.add_provider(&clock, None).unwrap();

        let id = pool.add_draw_calls(Uuid::new(), &effect, "default", Variables::new(), scene.object(0.0)).unwrap();
        clock.set("time", 1.5_f32).unwrap();
        assert!(pool.group_draw_calls(id)[0].is_dirty());

        pool.update();
        let draw_call = pool.group_draw_calls(id)[0];
        assert!(!draw_call.is_dirty());
        assert_eq!(draw_call.uniform("uTime"), Some(&Value::Float(1.5)));
    }
}
