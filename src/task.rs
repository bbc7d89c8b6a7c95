//! Ordered render-task descriptors.
//!
//! A [`TaskGraphBuilder`] holds the tasks an [`Engine`](crate::Engine) runs
//! each frame. Tasks execute in insertion order, and later tasks may read
//! context written by earlier ones (the render-setup task publishes the
//! camera and viewport every other task uses).
//!
//! Every task owns a [`ParamBlock`] with up to four entries:
//!
//! | key          | contents                                          |
//! |--------------|---------------------------------------------------|
//! | `params`     | document of per-kind settings                     |
//! | `collection` | document with `name`, `repr` and `rootPath`       |
//! | `renderTags` | token array filtering prims by render tag         |
//! | `children`   | tasks run right after this one, once per frame    |
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use hdpick::{ScenePath, TaskGraphBuilder, TaskKind, TokenRegistry};
//!
//! let tokens = Rc::new(TokenRegistry::new());
//! let camera = ScenePath::new("/camera").unwrap();
//! let mut graph = TaskGraphBuilder::new(tokens, camera);
//!
//! graph.add_task(TaskKind::RenderSetup, ScenePath::new("/renderSetupTask").unwrap());
//! graph.add_task(TaskKind::Render, ScenePath::new("/renderTask").unwrap());
//!
//! let order: Vec<_> = graph.ids().iter().map(|p| p.to_string()).collect();
//! assert_eq!(order, ["/renderSetupTask", "/renderTask"]);
//! ```

use std::rc::Rc;

use glam::Vec4;

use crate::dirty::DirtyBits;
use crate::path::ScenePath;
use crate::token::{Token, TokenRegistry};
use crate::value::{ParamBlock, Value};

/// The closed set of task kinds the engine knows how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    RenderSetup,
    Render,
    SimpleLight,
    Pick,
    ColorCorrection,
}

impl TaskKind {
    /// Default parameter block for a freshly added task.
    fn default_block(
        self,
        tokens: &TokenRegistry,
        camera: &ScenePath,
        viewport: Vec4,
    ) -> ParamBlock {
        match self {
            TaskKind::RenderSetup => ParamBlock::new().with(
                &tokens.params,
                ParamBlock::new()
                    .with(&tokens.camera, camera.clone())
                    .with(&tokens.viewport, viewport)
                    .with(&tokens.enable_id_render, false),
            ),
            TaskKind::Render => ParamBlock::new()
                .with(
                    &tokens.params,
                    ParamBlock::new().with(&tokens.enable_lighting, true),
                )
                .with(&tokens.collection, default_collection(tokens))
                .with(&tokens.render_tags, Vec::<Token>::new())
                .with(&tokens.children, Vec::<ScenePath>::new()),
            TaskKind::SimpleLight => ParamBlock::new().with(
                &tokens.params,
                ParamBlock::new().with(&tokens.camera, camera.clone()),
            ),
            TaskKind::Pick => ParamBlock::new()
                .with(
                    &tokens.params,
                    ParamBlock::new().with(&tokens.enable_id_render, true),
                )
                .with(&tokens.collection, default_collection(tokens))
                .with(&tokens.render_tags, Vec::<Token>::new()),
            TaskKind::ColorCorrection => ParamBlock::new().with(
                &tokens.params,
                ParamBlock::new().with(&tokens.color_correction_mode, tokens.srgb.clone()),
            ),
        }
    }
}

fn default_collection(tokens: &TokenRegistry) -> ParamBlock {
    ParamBlock::new()
        .with(&tokens.name, tokens.geometry.clone())
        .with(&tokens.repr, tokens.smooth_hull.clone())
        .with(&tokens.root_path, ScenePath::root())
}

/// One task: its id, kind and parameter block.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskDescriptor {
    pub id: ScenePath,
    pub kind: TaskKind,
    pub block: ParamBlock,
}

impl TaskDescriptor {
    pub fn param(&self, name: &Token) -> &Value {
        self.block.get(name)
    }
}

pub struct TaskGraphBuilder {
    tokens: Rc<TokenRegistry>,
    camera: ScenePath,
    viewport: Vec4,
    tasks: Vec<TaskDescriptor>,
}

impl TaskGraphBuilder {
    pub fn new(tokens: Rc<TokenRegistry>, camera: ScenePath) -> Self {
        Self {
            tokens,
            camera,
            viewport: Vec4::new(0.0, 0.0, 512.0, 512.0),
            tasks: Vec::new(),
        }
    }

    /// Viewport written into render-setup tasks added from now on.
    pub fn with_viewport(mut self, viewport: Vec4) -> Self {
        self.viewport = viewport;
        self
    }

    /// Appends a task with default parameters.
    ///
    /// Adding an id that already exists resets that task in place and keeps
    /// its position in the execution order.
    pub fn add_task(&mut self, kind: TaskKind, id: ScenePath) -> &mut TaskDescriptor {
        let block = kind.default_block(&self.tokens, &self.camera, self.viewport);
        let descriptor = TaskDescriptor {
            id: id.clone(),
            kind,
            block,
        };
        let index = match self.tasks.iter().position(|t| t.id == id) {
            Some(index) => {
                log::debug!("resetting task {id} as {kind:?}");
                self.tasks[index] = descriptor;
                index
            }
            None => {
                self.tasks.push(descriptor);
                self.tasks.len() - 1
            }
        };
        &mut self.tasks[index]
    }

    pub fn task(&self, id: &ScenePath) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &ScenePath) -> Option<&mut TaskDescriptor> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub fn contains(&self, id: &ScenePath) -> bool {
        self.task(id).is_some()
    }

    /// Overwrites one top-level entry of a task's block.
    ///
    /// Returns the dirty bits the write implies (`COLLECTION` for
    /// `collection`, `PARAMS` for `params`, nothing otherwise), or `None` if
    /// the task does not exist.
    pub fn set_param(
        &mut self,
        id: &ScenePath,
        name: &Token,
        value: impl Into<Value>,
    ) -> Option<DirtyBits> {
        let bits = self.dirty_bits_for(name);
        let task = self.task_mut(id)?;
        task.block.set(name, value);
        Some(bits)
    }

    /// Overwrites one field inside a task's `params` document.
    pub fn set_params_field(
        &mut self,
        id: &ScenePath,
        field: &Token,
        value: impl Into<Value>,
    ) -> Option<DirtyBits> {
        let params = self.tokens.params.clone();
        let task = self.task_mut(id)?;
        match task.block.get_mut(&params).and_then(Value::as_document_mut) {
            Some(doc) => doc.set(field, value),
            None => task.block.set(&params, ParamBlock::new().with(field, value)),
        }
        Some(DirtyBits::PARAMS)
    }

    /// Reads one top-level entry; unknown tasks and keys read as empty.
    pub fn get_param(&self, id: &ScenePath, name: &Token) -> Value {
        self.task(id)
            .map(|t| t.param(name).clone())
            .unwrap_or_default()
    }

    /// Pushes `viewport` into every render-setup task.
    pub fn set_viewport(&mut self, viewport: Vec4) -> Vec<ScenePath> {
        self.viewport = viewport;
        let ids: Vec<ScenePath> = self
            .tasks
            .iter()
            .filter(|t| t.kind == TaskKind::RenderSetup)
            .map(|t| t.id.clone())
            .collect();
        let field = self.tokens.viewport.clone();
        for id in &ids {
            self.set_params_field(id, &field, viewport);
        }
        ids
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    /// Task ids in execution order.
    pub fn ids(&self) -> Vec<ScenePath> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn dirty_bits_for(&self, name: &Token) -> DirtyBits {
        if *name == self.tokens.collection {
            DirtyBits::COLLECTION
        } else if *name == self.tokens.params {
            DirtyBits::PARAMS
        } else {
            DirtyBits::empty()
        }
    }
}
