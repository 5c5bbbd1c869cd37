//! The model loading session.
//!
//! A [`ViewerSession`] owns the scene, the model currently shown in it, the
//! mixer animating that model and the customization rules of the selected
//! product. Every [`ViewerSession::load`] runs the same sequence:
//!
//! 1. signal loading-started and bump the session generation
//! 2. stop the current mixer and release every GPU resource of the current
//!    model, then detach it
//! 3. fetch and parse the asset, forwarding progress
//! 4. prepare the result (genuine load) or hand the failure to the
//!    [`FallbackResolver`]
//! 5. attach the model, point the controls at it and signal loading-finished
//!
//! Loads are never cancelled. A load that completes after a newer one was
//! started sees a stale generation, discards its model and leaves the scene
//! alone. When it was superseded by [`ViewerSession::unload`] rather than by
//! another load, it still signals loading-finished so the started signal is
//! always answered.

use std::{
    cell::{RefCell, RefMut},
    rc::Rc,
};

use anyhow::anyhow;

use crate::{
    config::ViewerConfig,
    context::{GpuResources, HeadlessResources},
    controls::{Controls, OrbitControls},
    customization::{self, Product, RuleOutcome, RuleTable},
    data_structures::scene_graph::{NodeId, Scene, SceneNode},
    error::LoadError,
    fallback::{FallbackResolver, ModelSource, Recovered},
    normalize::Normalization,
    playback::{self, FrameClock, Mixer},
    resources::{AssetLoader, LoadProgress, ParsedAsset},
};

/// Receives the loading-state signals, e.g. to show and hide an overlay.
pub trait LoadingObserver {
    fn loading_started(&mut self, _reference: &str) {}

    /// Completion of the running load in percent.
    fn progress(&mut self, _percent: f32) {}

    fn loading_finished(&mut self) {}

    fn loading_failed(&mut self, _message: &str) {}
}

/// Writes every signal to the log.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LoadingObserver for LogObserver {
    fn loading_started(&mut self, reference: &str) {
        log::info!("loading {reference}");
    }

    fn progress(&mut self, percent: f32) {
        log::trace!("loading progress {percent:.0}%");
    }

    fn loading_finished(&mut self) {
        log::info!("loading finished");
    }

    fn loading_failed(&mut self, message: &str) {
        log::error!("loading failed: {message}");
    }
}

/// The result of one [`ViewerSession::load`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadReport {
    pub generation: u64,
    pub reference: String,
    pub source: ModelSource,
    pub normalization: Option<Normalization>,
    /// Animation clips embedded in the displayed model.
    pub clip_count: usize,
    /// False when a newer load started before this one completed.
    pub attached: bool,
}

struct CurrentModel {
    node: NodeId,
    reference: String,
    source: ModelSource,
    mixer: Option<Mixer>,
}

struct SessionState {
    scene: Scene,
    current: Option<CurrentModel>,
    generation: u64,
    /// Generation taken by the most recently started load.
    latest_load: u64,
    rules: Option<RuleTable>,
    gpu: Box<dyn GpuResources>,
    controls: Box<dyn Controls>,
}

impl SessionState {
    /// Stops the mixer, then detaches and disposes the current model.
    fn detach_current(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };
        if let Some(mixer) = current.mixer {
            playback::dispose(mixer);
        }
        match self.scene.remove(current.node) {
            Some(root) => {
                let released = root.dispose(self.gpu.as_mut());
                log::debug!("disposed {} ({released} meshes)", current.reference);
            }
            None => log::warn!("{} was no longer part of the scene", current.reference),
        }
    }
}

#[derive(Clone)]
pub struct ViewerSession {
    state: Rc<RefCell<SessionState>>,
    observer: Rc<RefCell<Box<dyn LoadingObserver>>>,
    loader: Rc<dyn AssetLoader>,
    resolver: FallbackResolver,
    config: Rc<ViewerConfig>,
}

impl ViewerSession {
    /// A session with headless GPU bookkeeping, default orbit controls and
    /// signals going to the log.
    pub fn new(config: ViewerConfig, loader: impl AssetLoader + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(SessionState {
                scene: Scene::new(),
                current: None,
                generation: 0,
                latest_load: 0,
                rules: None,
                gpu: Box::new(HeadlessResources::new()),
                controls: Box::new(OrbitControls::default()),
            })),
            observer: Rc::new(RefCell::new(Box::new(LogObserver) as Box<dyn LoadingObserver>)),
            loader: Rc::new(loader),
            resolver: config.fallback_resolver(),
            config: Rc::new(config),
        }
    }

    /// A session loading glTF assets from `config.asset_root`.
    pub fn from_config(config: ViewerConfig) -> Self {
        let loader = config.loader();
        Self::new(config, loader)
    }

    pub fn with_gpu(self, gpu: impl GpuResources + 'static) -> Self {
        self.state.borrow_mut().gpu = Box::new(gpu);
        self
    }

    pub fn with_controls(self, controls: impl Controls + 'static) -> Self {
        self.state.borrow_mut().controls = Box::new(controls);
        self
    }

    pub fn with_observer(self, observer: impl LoadingObserver + 'static) -> Self {
        *self.observer.borrow_mut() = Box::new(observer);
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub async fn load(&self, reference: &str) -> anyhow::Result<LoadReport> {
        self.load_with_progress(reference, &mut |_: f32| {}).await
    }

    /**
     * Replaces the current model with the asset at `reference`.
     *
     * `on_progress` receives the completion in percent whenever the total
     * size is known. Values never decrease within one call.
     *
     * Missing, broken and empty assets are recovered by the fallback chain,
     * so an `Err` means the session itself is in a bad state. Such an error
     * is also signalled as loading-failed.
     */
    pub async fn load_with_progress(
        &self,
        reference: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> anyhow::Result<LoadReport> {
        let result = self.run_load(reference, on_progress).await;
        if let Err(e) = &result {
            let message = format!("{e:#}");
            self.notify(|observer| observer.loading_failed(&message));
        }
        result
    }

    async fn run_load(
        &self,
        reference: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> anyhow::Result<LoadReport> {
        self.notify(|observer| observer.loading_started(reference));
        let generation = {
            let mut state = self.state_mut()?;
            state.generation += 1;
            state.latest_load = state.generation;
            state.detach_current();
            state.rules = None;
            state.generation
        };

        let mut last_percent = 0.0f32;
        let mut report_progress = |progress: LoadProgress| {
            let Some(percent) = progress.percent() else {
                return;
            };
            let percent = percent.max(last_percent);
            last_percent = percent;
            on_progress(percent);
            if self.is_current(generation) {
                self.notify(|observer| observer.progress(percent));
            }
        };
        let loaded = self.loader.load(reference, &mut report_progress).await;

        let recovered = match loaded {
            Ok(ParsedAsset {
                scene: Some(mut root),
                animations,
            }) => {
                let normalization = self.prepare(&mut root);
                Recovered {
                    root,
                    animations,
                    source: ModelSource::Asset,
                    normalization: Some(normalization),
                }
            }
            Ok(ParsedAsset { scene: None, .. }) => {
                let error = LoadError::empty(reference);
                self.resolver.resolve(&*self.loader, reference, &error).await
            }
            Err(e) => {
                let error = LoadError::unavailable(reference, &e);
                self.resolver.resolve(&*self.loader, reference, &error).await
            }
        };

        let mut report = LoadReport {
            generation,
            reference: reference.to_string(),
            source: recovered.source.clone(),
            normalization: recovered.normalization,
            clip_count: recovered.animations.len(),
            attached: false,
        };

        {
            let mut state = self.state_mut()?;
            if state.generation != generation {
                // never uploaded, dropping the CPU copy is all there is to release
                log::warn!(
                    "discarding {reference}: superseded by generation {}",
                    state.generation
                );
                let unloaded = state.latest_load == generation;
                drop(state);
                if unloaded {
                    self.notify(|observer| observer.loading_finished());
                }
                return Ok(report);
            }
            let state = &mut *state;
            let mut root = recovered.root;
            root.transform.reset_rotation();
            let mixer = Mixer::bind(&root, recovered.animations);
            root.upload(state.gpu.as_mut());
            let center = root.bounding_box().center();
            let node = state.scene.add(root);
            state.current = Some(CurrentModel {
                node,
                reference: reference.to_string(),
                source: recovered.source,
                mixer,
            });
            state.controls.set_target(center);
            state.controls.update();
        }
        report.attached = true;

        self.notify(|observer| observer.loading_finished());
        Ok(report)
    }

    /// Standardises materials, applies the shadow policy and normalizes a
    /// genuinely loaded model.
    fn prepare(&self, root: &mut SceneNode) -> Normalization {
        let neutral = self.config.neutral_color;
        let shadows = self.config.shadows;
        root.transform.reset_rotation();
        root.for_each_mesh_mut(&mut |mesh| {
            mesh.material.make_standard(neutral);
            mesh.cast_shadow = shadows;
            mesh.receive_shadow = shadows;
        });
        self.config.primary_normalization.normalize(root)
    }

    /**
     * Loads the product's file and, when the product enables customization,
     * applies the default value of every parameter to the new model.
     */
    pub async fn select_product(&self, product: &Product) -> anyhow::Result<LoadReport> {
        let report = self.load(&product.filename).await?;
        if !report.attached {
            return Ok(report);
        }
        let Some(rules) = product.rules() else {
            log::debug!("product {} has no customization", product.id);
            return Ok(report);
        };
        self.set_rules(Some(rules.clone()))?;
        let mut state = self.state_mut()?;
        let state = &mut *state;
        if let (Some(current), Some(rules)) = (&state.current, &state.rules) {
            if let Some(root) = state.scene.get_mut(current.node) {
                customization::apply_defaults(root, rules);
            }
        }
        Ok(report)
    }

    /// Replaces the rule table used by [`Self::apply_customization`].
    pub fn set_rules(&self, rules: Option<RuleTable>) -> anyhow::Result<()> {
        self.state_mut()?.rules = rules;
        Ok(())
    }

    /// Applies `parameter_id` = `value` to the current model. A no-op
    /// without a model or a rule table.
    pub fn apply_customization(&self, parameter_id: &str, value: &str) -> RuleOutcome {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            log::warn!("session busy, dropping customization {parameter_id}={value}");
            return RuleOutcome::default();
        };
        let state = &mut *state;
        let (Some(current), Some(rules)) = (&state.current, &state.rules) else {
            return RuleOutcome::default();
        };
        match state.scene.get_mut(current.node) {
            Some(root) => customization::apply_rule(root, rules, parameter_id, value),
            None => RuleOutcome::default(),
        }
    }

    /// Advances the current model's animations. A no-op without a mixer.
    pub fn advance(&self, delta_seconds: f32) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        let state = &mut *state;
        let Some(current) = state.current.as_mut() else {
            return;
        };
        let (Some(mixer), Some(root)) = (current.mixer.as_mut(), state.scene.get_mut(current.node))
        else {
            return;
        };
        mixer.advance(root, delta_seconds);
    }

    /// Advances by the real time elapsed since the clock's previous tick.
    pub fn tick(&self, clock: &mut FrameClock) {
        self.advance(clock.tick_seconds());
    }

    /// Disposes the current model. Loads still in flight will not attach.
    pub fn unload(&self) -> anyhow::Result<()> {
        let mut state = self.state_mut()?;
        state.generation += 1;
        state.detach_current();
        state.rules = None;
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    pub fn has_model(&self) -> bool {
        self.state.borrow().current.is_some()
    }

    pub fn has_mixer(&self) -> bool {
        self.state
            .borrow()
            .current
            .as_ref()
            .is_some_and(|current| current.mixer.is_some())
    }

    pub fn current_reference(&self) -> Option<String> {
        self.state
            .borrow()
            .current
            .as_ref()
            .map(|current| current.reference.clone())
    }

    pub fn current_source(&self) -> Option<ModelSource> {
        self.state
            .borrow()
            .current
            .as_ref()
            .map(|current| current.source.clone())
    }

    pub fn with_model<R>(&self, f: impl FnOnce(&SceneNode) -> R) -> Option<R> {
        let state = self.state.borrow();
        let current = state.current.as_ref()?;
        state.scene.get(current.node).map(f)
    }

    pub fn with_mixer<R>(&self, f: impl FnOnce(&Mixer) -> R) -> Option<R> {
        let state = self.state.borrow();
        state.current.as_ref()?.mixer.as_ref().map(f)
    }

    pub fn with_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> R {
        f(&self.state.borrow().scene)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state
            .try_borrow()
            .map(|state| state.generation == generation)
            .unwrap_or(false)
    }

    fn state_mut(&self) -> anyhow::Result<RefMut<'_, SessionState>> {
        self.state
            .try_borrow_mut()
            .map_err(|_| anyhow!("viewer session state is already borrowed"))
    }

    fn notify(&self, signal: impl FnOnce(&mut dyn LoadingObserver)) {
        match self.observer.try_borrow_mut() {
            Ok(mut observer) => signal(observer.as_mut()),
            Err(_) => log::warn!("loading observer is busy, dropping signal"),
        }
    }
}
