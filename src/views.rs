//! Presentation-neutral view models.
//!
//! `CounterView` is the counter screen: the bound value plus the start/stop
//! and reset buttons. `ParentView` shows or hides it and can re-render on its
//! own without touching the counter's subscription.

use std::sync::Arc;

use tracing::{debug, info};

use crate::binding::{Binding, Renderer, UiContext};
use crate::controller::CounterController;
use crate::dispose::DisposeBag;

pub struct CounterView {
    binding: Binding<i64>,
    bag: DisposeBag,
    lock_reset_while_running: bool,
}

impl CounterView {
    /// Bind to `controller`'s value and render it once.
    pub fn mount(
        controller: &CounterController,
        context: Arc<dyn UiContext>,
        render: Renderer<i64>,
    ) -> Self {
        let mut view = Self {
            binding: Binding::new(controller.relay().clone(), context, render),
            bag: DisposeBag::new(),
            lock_reset_while_running: true,
        };
        view.render();
        view
    }

    /// Whether the reset button is disabled while the counter runs.
    pub fn set_reset_lock(&mut self, locked: bool) {
        self.lock_reset_while_running = locked;
    }

    /// Re-render. The binding subscribes only the first time.
    pub fn render(&mut self) {
        self.binding.attach(&mut self.bag);
    }

    pub fn value(&self) -> i64 {
        self.binding.current()
    }

    pub fn toggle(&mut self, controller: &mut CounterController) {
        controller.toggle();
    }

    pub fn reset_enabled(&self, controller: &CounterController) -> bool {
        !(self.lock_reset_while_running && controller.is_running())
    }

    /// Press the reset button. Returns false if the button is disabled.
    pub fn reset(&mut self, controller: &mut CounterController) -> bool {
        if !self.reset_enabled(controller) {
            debug!("reset ignored while running");
            return false;
        }
        controller.reset();
        true
    }

    /// The view is going away: stop counting and release every subscription.
    pub fn unmount(mut self, controller: &mut CounterController) {
        controller.stop();
        self.binding.detach();
        self.bag.dispose();
    }
}

/// Builds a fresh render callback each time the counter view is mounted.
pub type RendererFactory = Box<dyn Fn() -> Renderer<i64> + Send + Sync>;

pub struct ParentView {
    controller: CounterController,
    counter: Option<CounterView>,
    updates: u64,
    lock_reset_while_running: bool,
    context: Arc<dyn UiContext>,
    renderer: RendererFactory,
}

impl ParentView {
    pub fn new(
        controller: CounterController,
        context: Arc<dyn UiContext>,
        renderer: RendererFactory,
    ) -> Self {
        Self {
            controller,
            counter: None,
            updates: 0,
            lock_reset_while_running: true,
            context,
            renderer,
        }
    }

    pub fn controller(&self) -> &CounterController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CounterController {
        &mut self.controller
    }

    pub fn counter(&self) -> Option<&CounterView> {
        self.counter.as_ref()
    }

    pub fn is_showing_counter(&self) -> bool {
        self.counter.is_some()
    }

    pub fn set_reset_lock(&mut self, locked: bool) {
        self.lock_reset_while_running = locked;
        if let Some(view) = self.counter.as_mut() {
            view.set_reset_lock(locked);
        }
    }

    pub fn show_counter(&mut self) {
        if self.counter.is_some() {
            return;
        }
        let mut view = CounterView::mount(
            &self.controller,
            Arc::clone(&self.context),
            (self.renderer)(),
        );
        view.set_reset_lock(self.lock_reset_while_running);
        self.counter = Some(view);
        info!("counter view shown");
    }

    pub fn hide_counter(&mut self) {
        if let Some(view) = self.counter.take() {
            view.unmount(&mut self.controller);
            info!("counter view hidden");
        }
    }

    pub fn toggle_counter(&mut self) {
        if self.is_showing_counter() {
            self.hide_counter();
        } else {
            self.show_counter();
        }
    }

    /// Re-render the parent, which re-renders the counter view if shown.
    pub fn update(&mut self) {
        self.updates += 1;
        if let Some(view) = self.counter.as_mut() {
            view.render();
        }
        debug!(updates = self.updates, "parent view updated");
    }

    /// How many times the parent has re-rendered.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// The start/stop button. Returns false if the counter view is hidden.
    pub fn toggle_running(&mut self) -> bool {
        match self.counter.as_mut() {
            Some(view) => {
                view.toggle(&mut self.controller);
                true
            }
            None => false,
        }
    }

    /// The reset button. Returns false if hidden or disabled.
    pub fn reset(&mut self) -> bool {
        match self.counter.as_mut() {
            Some(view) => view.reset(&mut self.controller),
            None => false,
        }
    }
}
