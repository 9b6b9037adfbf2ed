use std::cell::RefCell;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use shoal_animation::AnimationMixer;
use shoal_assets::{AssetError, AssetId, AssetLoader, DefaultLoader};
use shoal_common::{NodeId, Transform};
use shoal_render::Renderer;
use shoal_scene::{
    Camera, Geometry, Light, LightKind, Material, MeshData, Node, NodeKind, Scene, SceneError,
};

use crate::clock::{Clock, SystemClock};
use crate::host::FrameHost;
use crate::timer::{IntervalTimers, TimerHandle};

const GRID_CELLS: u32 = 20;
const GRID_CELL_SIZE: f32 = 10.0;

/// What a frame observer reports. An `Err` is logged; the observer stays registered.
pub type ObserverResult = Result<(), Box<dyn std::error::Error>>;

type Observer = Box<dyn FnMut(&mut Scene, f32) -> ObserverResult>;
type LoadedCallback<R> = Box<dyn FnOnce(&mut World<R>)>;

/// Disposal handle returned by [`World::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverHandle(u64);

/// Disposal handle returned by [`World::add_animation_mixer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MixerHandle(u64);

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport<O> {
    /// 1 for the first tick.
    pub frame: u64,
    /// Seconds since the previous tick; 0.0 on the first.
    pub delta: f32,
    /// Renderer output, or `None` when no camera was set.
    pub output: Option<O>,
}

/// A loaded hierarchy kept by name for cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub root: NodeId,
    pub id: AssetId,
}

/// A load that did not produce a template.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub name: String,
    pub path: PathBuf,
    pub message: String,
}

struct ObserverSlot {
    handle: ObserverHandle,
    callback: Observer,
    enabled: bool,
}

struct MixerSlot {
    handle: MixerHandle,
    mixer: Rc<RefCell<AnimationMixer>>,
}

/// The frame scheduler.
///
/// Owns the scene and sequences everything that happens to it per frame.
/// Clock, renderer and asset loader are injected so a run can be made fully
/// deterministic.
pub struct World<R: Renderer> {
    scene: Scene,
    camera: Option<Camera>,
    renderer: R,
    clock: Box<dyn Clock>,
    loader: Box<dyn AssetLoader>,
    observers: Vec<ObserverSlot>,
    mixers: Vec<MixerSlot>,
    timers: IntervalTimers,
    templates: BTreeMap<String, Template>,
    load_failures: Vec<LoadFailure>,
    pending_loaded: Vec<LoadedCallback<R>>,
    loading_settled: bool,
    frame: u64,
    last_tick: Option<Duration>,
    next_handle: u64,
}

impl<R: Renderer> World<R> {
    /// World on the system clock with the default loader and scene setup.
    pub fn new(renderer: R) -> Self {
        let mut scene = Scene::new();
        setup_default_scene(&mut scene);
        Self {
            scene,
            camera: None,
            renderer,
            clock: Box::new(SystemClock::new()),
            loader: Box::new(DefaultLoader::new()),
            observers: Vec::new(),
            mixers: Vec::new(),
            timers: IntervalTimers::default(),
            templates: BTreeMap::new(),
            load_failures: Vec::new(),
            pending_loaded: Vec::new(),
            loading_settled: false,
            frame: 0,
            last_tick: None,
            next_handle: 0,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_loader(mut self, loader: impl AssetLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Ticks completed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// Replace the camera; `None` disables rendering. Takes effect next tick.
    pub fn set_camera(&mut self, camera: Option<Camera>) {
        self.camera = camera;
    }

    /// Propagate a viewport size to the camera's aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(camera) = &mut self.camera {
            camera.set_viewport(width, height);
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    // --- observers ---

    /// Append a frame observer. Observers run after mixers, in registration order.
    pub fn register(
        &mut self,
        observer: impl FnMut(&mut Scene, f32) -> ObserverResult + 'static,
    ) -> ObserverHandle {
        let handle = ObserverHandle(self.next_id());
        self.observers.push(ObserverSlot {
            handle,
            callback: Box::new(observer),
            enabled: true,
        });
        tracing::debug!(?handle, "observer registered");
        handle
    }

    /// Remove an observer. Returns `false` if the handle was already gone.
    pub fn cancel(&mut self, handle: ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.handle != handle);
        self.observers.len() != before
    }

    /// Observers that will still be invoked.
    pub fn observer_count(&self) -> usize {
        self.observers.iter().filter(|o| o.enabled).count()
    }

    // --- mixers ---

    /// Append a mixer. The same mixer added twice is advanced twice per tick.
    pub fn add_animation_mixer(&mut self, mixer: Rc<RefCell<AnimationMixer>>) -> MixerHandle {
        let handle = MixerHandle(self.next_id());
        self.mixers.push(MixerSlot { handle, mixer });
        handle
    }

    pub fn remove_animation_mixer(&mut self, handle: MixerHandle) -> bool {
        let before = self.mixers.len();
        self.mixers.retain(|m| m.handle != handle);
        self.mixers.len() != before
    }

    pub fn mixer_count(&self) -> usize {
        self.mixers.len()
    }

    // --- timers ---

    /// Run `callback` every `period` (millisecond granularity) from the tick loop.
    pub fn set_interval(&mut self, period: Duration, callback: impl FnMut() + 'static) -> TimerHandle {
        let handle = TimerHandle(self.next_id());
        let now = self.clock.now();
        self.timers.insert(handle, now, period, Box::new(callback));
        handle
    }

    pub fn clear_interval(&mut self, handle: TimerHandle) -> bool {
        self.timers.remove(handle)
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    // --- loading ---

    /// Load a model through the injected loader and keep it as template `name`.
    ///
    /// With `add_to_scene` the root is also attached under the scene root.
    /// Failures are logged and recorded in [`World::load_failures`].
    pub fn load_model(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
        add_to_scene: bool,
    ) -> Result<NodeId, AssetError> {
        let path = path.as_ref();
        let result = self.load_inner(name, path, add_to_scene);
        if let Err(e) = &result {
            tracing::error!(name, path = %path.display(), error = %e, "model load failed");
            self.load_failures.push(LoadFailure {
                name: name.to_string(),
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
        result
    }

    fn load_inner(&mut self, name: &str, path: &Path, add_to_scene: bool) -> Result<NodeId, AssetError> {
        let loaded = self.loader.load(path, &mut self.scene)?;
        if let Some(root) = self.scene.node_mut(loaded.root) {
            root.name = name.to_string();
        }
        if add_to_scene {
            if let Err(e) = self.scene.add(loaded.root) {
                self.scene.remove(loaded.root)?;
                return Err(e.into());
            }
        }

        let template = Template {
            root: loaded.root,
            id: loaded.id,
        };
        if let Some(previous) = self.templates.insert(name.to_string(), template) {
            if previous.id != loaded.id {
                tracing::warn!(
                    name,
                    previous = ?previous.id,
                    replacement = ?loaded.id,
                    "template replaced by a different asset"
                );
            }
            if self.scene.contains(previous.root) && !self.scene.is_attached(previous.root) {
                self.scene.remove(previous.root)?;
            }
        }
        tracing::info!(name, path = %path.display(), root = %loaded.root.short(), "model loaded");
        Ok(loaded.root)
    }

    /// Root of the template loaded as `name`.
    pub fn template(&self, name: &str) -> Option<NodeId> {
        self.templates.get(name).map(|t| t.root)
    }

    pub fn templates(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.load_failures
    }

    /// Whether queued load callbacks have already run.
    pub fn is_loading_settled(&self) -> bool {
        self.loading_settled
    }

    /// Run `callback` once loading has settled.
    ///
    /// Before the first tick the callback is queued; queued callbacks run in
    /// registration order at the start of that tick. Afterwards it runs
    /// immediately.
    pub fn on_loaded(&mut self, callback: impl FnOnce(&mut World<R>) + 'static) {
        if self.loading_settled {
            callback(self);
        } else {
            self.pending_loaded.push(Box::new(callback));
        }
    }

    fn settle_loading(&mut self) {
        if self.loading_settled {
            return;
        }
        self.loading_settled = true;
        let pending = std::mem::take(&mut self.pending_loaded);
        tracing::info!(
            templates = self.templates.len(),
            failures = self.load_failures.len(),
            callbacks = pending.len(),
            "loading settled"
        );
        for callback in pending {
            callback(self);
        }
    }

    /// Attach a ground grid: four quadrants of `GRID_CELLS`² line squares,
    /// each `GRID_CELL_SIZE` wide, meeting at the origin.
    pub fn show_grid(&mut self) -> Result<NodeId, SceneError> {
        let grid = self.scene.spawn(Node::group("grid"));
        let geometry = Arc::new(Geometry {
            name: "grid_quadrant".into(),
            vertex_count: GRID_CELLS * GRID_CELLS * 5,
            index_count: 0,
        });
        let material = Arc::new(Material {
            name: "grid_line".into(),
            base_color: [0.0, 0.0, 0.0, 1.0],
        });
        for (sx, sz) in [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)] {
            let mesh = MeshData {
                geometry: Arc::clone(&geometry),
                material: Arc::clone(&material),
            };
            let mut node = Node::new(format!("grid{sx:+}{sz:+}"), NodeKind::Mesh(mesh));
            // mirror a single quadrant layout into each sign pair
            node.transform.scale = Vec3::new(sx * GRID_CELL_SIZE, 1.0, sz * GRID_CELL_SIZE);
            let id = self.scene.spawn(node);
            self.scene.add_child(grid, id)?;
        }
        self.scene.add(grid)?;
        Ok(grid)
    }

    // --- loop ---

    /// Advance one frame.
    pub fn tick(&mut self) -> TickReport<R::Output> {
        let now = self.clock.now();
        let delta = match self.last_tick.replace(now) {
            Some(previous) => now.saturating_sub(previous).as_secs_f32(),
            None => 0.0,
        };
        self.frame += 1;
        let span = tracing::info_span!("tick", frame = self.frame);
        let _enter = span.enter();

        self.settle_loading();
        let fired = self.timers.pump(now);
        self.advance_mixers(delta);
        self.notify_observers(delta);

        let output = match &self.camera {
            Some(camera) => Some(self.renderer.render(&self.scene, camera)),
            None => None,
        };
        tracing::trace!(delta, fired, rendered = output.is_some(), "tick done");

        TickReport {
            frame: self.frame,
            delta,
            output,
        }
    }

    fn advance_mixers(&mut self, delta: f32) {
        for slot in &self.mixers {
            let Ok(mut mixer) = slot.mixer.try_borrow_mut() else {
                tracing::warn!(handle = ?slot.handle, "mixer borrowed elsewhere; skipped this tick");
                continue;
            };
            let pose = mixer.update(delta);
            let root = mixer.root();
            drop(mixer);
            self.scene.apply_pose(root, &pose);
        }
    }

    fn notify_observers(&mut self, delta: f32) {
        let scene = &mut self.scene;
        for slot in self.observers.iter_mut().filter(|o| o.enabled) {
            let outcome = catch_unwind(AssertUnwindSafe(|| (slot.callback)(scene, delta)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(handle = ?slot.handle, error = %e, "observer failed");
                }
                Err(payload) => {
                    slot.enabled = false;
                    tracing::error!(
                        handle = ?slot.handle,
                        panic = panic_message(payload.as_ref()),
                        "observer panicked; disabled"
                    );
                }
            }
        }
    }

    /// Tick once per frame the host grants. Returns the number of frames run.
    pub fn run(&mut self, host: &mut impl FrameHost) -> u64 {
        self.run_with(host, |_| {})
    }

    /// Like [`World::run`], handing each report to `on_frame`.
    pub fn run_with(
        &mut self,
        host: &mut impl FrameHost,
        mut on_frame: impl FnMut(&TickReport<R::Output>),
    ) -> u64 {
        tracing::info!("loop started");
        let mut frames = 0;
        let mut viewport = None;
        while host.request_frame() {
            let current = host.viewport();
            if current != viewport {
                if let Some((w, h)) = current {
                    self.resize(w, h);
                }
                viewport = current;
            }
            let report = self.tick();
            on_frame(&report);
            frames += 1;
        }
        tracing::info!(frames, "loop ended by host");
        frames
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Background colour and the fixed lighting rig every aquarium starts with.
fn setup_default_scene(scene: &mut Scene) {
    scene.background = Some(0x77bbcc);
    let lights = [
        (
            "ambient",
            Vec3::ZERO,
            Light {
                kind: LightKind::Ambient,
                color: 0xffffff,
                intensity: 0.5,
            },
        ),
        (
            "key",
            Vec3::new(-10.0, 20.0, 10.0),
            Light {
                kind: LightKind::Point { range: 100.0 },
                color: 0xffffff,
                intensity: 0.75,
            },
        ),
        (
            "fill",
            Vec3::new(10.0, 20.0, -10.0),
            Light {
                kind: LightKind::Point { range: 100.0 },
                color: 0xffffff,
                intensity: 0.75,
            },
        ),
    ];
    for (name, position, light) in lights {
        let node = Node::new(name, NodeKind::Light(light)).with_transform(Transform::from_position(position));
        let id = scene.spawn(node);
        if let Err(e) = scene.add(id) {
            tracing::warn!(name, error = %e, "could not attach default light");
        }
    }
}
