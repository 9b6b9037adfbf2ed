use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shoal_animation::{ActionId, AnimationClip, AnimationMixer};
use shoal_common::NodeId;
use shoal_kernel::{MixerHandle, ObserverHandle, ObserverResult, TimerHandle, World};
use shoal_render::Renderer;
use shoal_scene::{CloneError, Scene, SceneError, clone_skinned};

use crate::params::{FishParams, ParamsError};
use crate::steering::{Motion, advance, yaw_of};

#[derive(Debug, thiserror::Error)]
pub enum FishError {
    #[error("no template named '{0}' has been loaded")]
    MissingTemplate(String),
    #[error("clip '{0}' is not available on this fish")]
    UnknownClip(String),
    #[error("invalid fish parameters: {0}")]
    InvalidParams(#[from] ParamsError),
    #[error(transparent)]
    Clone(#[from] CloneError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// State written by the retarget timer and read by the frame observer.
/// Heading is not kept here; it is read from the mesh rotation every frame.
#[derive(Debug)]
struct FishState {
    destination: Vec2,
}

/// One swimming instance: a skinned clone of a template, its own mixer, a
/// frame observer that steers it, and a timer that picks new destinations.
///
/// Lives until [`Fish::dispose`]; dropping a `Fish` leaves its registrations
/// running.
#[derive(Debug)]
pub struct Fish {
    mesh: NodeId,
    mixer: Rc<RefCell<AnimationMixer>>,
    clips: Vec<Arc<AnimationClip>>,
    state: Rc<RefCell<FishState>>,
    params: FishParams,
    active: Option<ActionId>,
    observer: ObserverHandle,
    timer: TimerHandle,
    mixer_handle: MixerHandle,
    disposed: bool,
}

impl Fish {
    /// Clone template `template` into the scene and start it swimming.
    ///
    /// `seed` drives the destination sequence, so equal seeds wander alike.
    pub fn spawn<R: Renderer>(
        world: &mut World<R>,
        template: &str,
        params: FishParams,
        seed: u64,
    ) -> Result<Self, FishError> {
        params.validate()?;
        let source = world
            .template(template)
            .ok_or_else(|| FishError::MissingTemplate(template.to_string()))?;

        let scene = world.scene_mut();
        let mesh = clone_skinned(scene, source)?;
        if let Err(e) = scene.add(mesh) {
            scene.remove(mesh)?;
            return Err(e.into());
        }
        let clips = match scene.node_mut(mesh) {
            Some(node) => {
                node.transform.scale = Vec3::splat(params.scale);
                node.transform.rotation = Quat::from_rotation_y(params.initial_yaw);
                node.animations.clone()
            }
            None => Vec::new(),
        };

        let state = Rc::new(RefCell::new(FishState {
            destination: Vec2::ZERO,
        }));

        let mixer = Rc::new(RefCell::new(AnimationMixer::new(mesh)));
        let mixer_handle = world.add_animation_mixer(Rc::clone(&mixer));
        let observer = world.register(steer(mesh, Rc::clone(&state), params.clone()));
        let timer = world.set_interval(
            params.retarget_interval(),
            retarget(Rc::clone(&state), &params, seed),
        );

        let mut fish = Self {
            mesh,
            mixer,
            clips,
            state,
            params,
            active: None,
            observer,
            timer,
            mixer_handle,
            disposed: false,
        };
        if let Some(clip) = fish.params.clip.clone()
            && let Err(e) = fish.play(&clip)
        {
            fish.dispose(world)?;
            return Err(e);
        }
        tracing::info!(mesh = %mesh.short(), template, seed, "fish spawned");
        Ok(fish)
    }

    /// Switch to `clip`. Returns `false` when it is already the active clip.
    ///
    /// The first clip starts at full weight; later ones cross-fade from the
    /// previous over `params.cross_fade` seconds.
    pub fn play(&mut self, clip: &str) -> Result<bool, FishError> {
        let mut mixer = self.mixer.borrow_mut();
        let active_name = self
            .active
            .and_then(|id| mixer.action(id))
            .map(|a| a.clip().name.as_str());
        if active_name == Some(clip) {
            return Ok(false);
        }

        let to = match mixer.existing_action(clip) {
            Some(id) => id,
            None => {
                let source = self
                    .clips
                    .iter()
                    .find(|c| c.name == clip)
                    .ok_or_else(|| FishError::UnknownClip(clip.to_string()))?;
                mixer.clip_action(source)
            }
        };
        match self.active {
            Some(from) => mixer.cross_fade_from(to, from, self.params.cross_fade),
            None => mixer.play(to),
        };
        self.active = Some(to);
        tracing::debug!(mesh = %self.mesh.short(), clip, "fish clip changed");
        Ok(true)
    }

    /// Cancel the observer, timer and mixer and remove the mesh. Idempotent.
    pub fn dispose<R: Renderer>(&mut self, world: &mut World<R>) -> Result<(), FishError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        world.cancel(self.observer);
        world.clear_interval(self.timer);
        world.remove_animation_mixer(self.mixer_handle);
        self.mixer.borrow_mut().stop_all_action();
        self.active = None;
        if world.scene().contains(self.mesh) {
            world.scene_mut().remove(self.mesh)?;
        }
        tracing::info!(mesh = %self.mesh.short(), "fish disposed");
        Ok(())
    }

    pub fn mesh(&self) -> NodeId {
        self.mesh
    }

    pub fn mixer(&self) -> &Rc<RefCell<AnimationMixer>> {
        &self.mixer
    }

    pub fn params(&self) -> &FishParams {
        &self.params
    }

    pub fn destination(&self) -> Vec2 {
        self.state.borrow().destination
    }

    /// Override the current destination until the next retarget.
    pub fn set_destination(&self, destination: Vec2) {
        self.state.borrow_mut().destination = destination;
    }

    /// Current heading, read from the mesh. `None` once the mesh is gone.
    pub fn yaw(&self, scene: &Scene) -> Option<f32> {
        scene.node(self.mesh).map(|n| yaw_of(n.transform.rotation))
    }

    pub fn active_clip(&self) -> Option<String> {
        let mixer = self.mixer.borrow();
        self.active
            .and_then(|id| mixer.action(id))
            .map(|a| a.clip().name.clone())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

fn steer(
    mesh: NodeId,
    state: Rc<RefCell<FishState>>,
    params: FishParams,
) -> impl FnMut(&mut Scene, f32) -> ObserverResult {
    move |scene: &mut Scene, delta: f32| -> ObserverResult {
        let node = scene
            .node_mut(mesh)
            .ok_or_else(|| format!("fish mesh {} is gone", mesh.short()))?;
        let position = node.transform.position;
        let yaw = yaw_of(node.transform.rotation);
        let next = advance(
            Motion {
                position: position.truncate(),
                yaw,
            },
            state.borrow().destination,
            delta,
            &params,
        );
        node.transform.position = next.position.extend(position.z);
        if next.yaw != yaw {
            node.transform.rotation = Quat::from_rotation_y(next.yaw);
        }
        Ok(())
    }
}

fn retarget(state: Rc<RefCell<FishState>>, params: &FishParams, seed: u64) -> impl FnMut() + use<> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (min, max) = (params.destination_min, params.destination_max);
    let probability = params.retarget_probability;
    move || {
        if !rng.random_bool(probability) {
            return;
        }
        let destination = Vec2::new(rng.random_range(min.x..max.x), rng.random_range(min.y..max.y));
        state.borrow_mut().destination = destination;
        tracing::trace!(x = destination.x, y = destination.y, "fish retargeted");
    }
}
