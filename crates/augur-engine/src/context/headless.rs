use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::math::{SurfaceSize, Viewport};

use super::backend::{
    GraphicsContext, Location, RawHandle, ResourceDescriptor, ResourceKind, UniformValue,
};

/// One call recorded by [`HeadlessContext`] inside a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Bind { kind: ResourceKind, raw: RawHandle },
    Viewport(Viewport),
    Clear { framebuffer: Option<RawHandle>, color: [f32; 4], depth: f32 },
    Draw(DrawCall),
}

/// Snapshot of the bound state at a `draw` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub framebuffer: Option<RawHandle>,
    pub program: Option<RawHandle>,
    pub mesh: Option<RawHandle>,
    pub textures: BTreeMap<Location, RawHandle>,
    pub uniforms: BTreeMap<Location, UniformValue>,
    pub viewport: Option<Viewport>,
}

/// How a recorded frame ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameStatus {
    Presented,
    Abandoned,
}

/// Everything recorded between `begin_frame` and `present`/`abandon_frame`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLog {
    pub status: FrameStatus,
    pub commands: Vec<Command>,
}

impl FrameLog {
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw(d) => Some(d),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    pub fn clears(&self) -> impl Iterator<Item = (Option<RawHandle>, [f32; 4])> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::Clear { framebuffer, color, .. } => Some((*framebuffer, *color)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
struct HeadlessObject {
    kind: ResourceKind,
    label: String,
    size: Option<SurfaceSize>,
    attachments: Option<(RawHandle, RawHandle)>,
    depth: bool,
}

#[derive(Debug, Default)]
struct BoundState {
    framebuffer: Option<RawHandle>,
    program: Option<RawHandle>,
    mesh: Option<RawHandle>,
    texture_slot: Option<Location>,
    textures: BTreeMap<Location, RawHandle>,
    uniforms: BTreeMap<Location, UniformValue>,
    viewport: Option<Viewport>,
}

/// Finished frames kept by [`HeadlessContext::new`].
pub const DEFAULT_FRAME_HISTORY: usize = 64;

/// Rendering context that records instead of drawing.
///
/// Used by the unit tests and by the viewer's headless mode. It validates
/// descriptors like a real device would, tracks live objects per kind and
/// keeps a log of the most recent finished frames. Failures can be injected with
/// [`HeadlessContext::fail_next_create`] and friends, and
/// [`HeadlessContext::lose_context`] simulates a device reset.
#[derive(Debug)]
pub struct HeadlessContext {
    generation: u64,
    size: SurfaceSize,
    next_name: u32,
    objects: HashMap<RawHandle, HeadlessObject>,
    created: usize,
    destroyed: usize,

    bound: BoundState,
    recording: Option<Vec<Command>>,
    frames: VecDeque<FrameLog>,
    frame_history: usize,
    presented: usize,
    abandoned: usize,

    fail_next_create: Option<String>,
    fail_framebuffers: bool,
    fail_begin: bool,
}

impl HeadlessContext {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            generation: 1,
            size,
            next_name: 1,
            objects: HashMap::new(),
            created: 0,
            destroyed: 0,
            bound: BoundState::default(),
            recording: None,
            frames: VecDeque::new(),
            frame_history: DEFAULT_FRAME_HISTORY,
            presented: 0,
            abandoned: 0,
            fail_next_create: None,
            fail_framebuffers: false,
            fail_begin: false,
        }
    }

    /// Keeps only the last `frames` finished frames. Frame counters stay
    /// exact regardless.
    pub fn with_frame_history(mut self, frames: usize) -> Self {
        self.frame_history = frames;
        while self.frames.len() > frames {
            self.frames.pop_front();
        }
        self
    }

    /// Simulates a surface resize reported by the platform.
    pub fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    /// Simulates device loss: every object disappears and the generation
    /// advances. Names keep increasing so stale handles never alias new ones.
    pub fn lose_context(&mut self) {
        self.objects.clear();
        self.bound = BoundState::default();
        self.recording = None;
        self.generation += 1;
    }

    /// Makes the next `create` call fail with `reason`.
    pub fn fail_next_create(&mut self, reason: impl Into<String>) {
        self.fail_next_create = Some(reason.into());
    }

    /// Makes every framebuffer report incomplete until switched off.
    pub fn fail_framebuffers(&mut self, fail: bool) {
        self.fail_framebuffers = fail;
    }

    /// Makes `begin_frame` fail until switched off.
    pub fn fail_begin_frame(&mut self, fail: bool) {
        self.fail_begin = fail;
    }

    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.objects.values().filter(|o| o.kind == kind).count()
    }

    pub fn is_live(&self, raw: RawHandle) -> bool {
        self.objects.contains_key(&raw)
    }

    /// Size of a live texture or render target.
    pub fn object_size(&self, raw: RawHandle) -> Option<SurfaceSize> {
        self.objects.get(&raw).and_then(|o| o.size)
    }

    pub fn object_label(&self, raw: RawHandle) -> Option<&str> {
        self.objects.get(&raw).map(|o| o.label.as_str())
    }

    /// Retained frames, oldest first.
    pub fn frames(&self) -> &VecDeque<FrameLog> {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameLog> {
        self.frames.back()
    }

    /// Frames presented since creation, retained or not.
    pub fn presented_frames(&self) -> usize {
        self.presented
    }

    pub fn abandoned_frames(&self) -> usize {
        self.abandoned
    }

    fn record(&mut self, command: Command) {
        if let Some(commands) = self.recording.as_mut() {
            commands.push(command);
        }
    }

    fn finish(&mut self, status: FrameStatus) {
        let Some(commands) = self.recording.take() else {
            return;
        };
        match status {
            FrameStatus::Presented => self.presented += 1,
            FrameStatus::Abandoned => self.abandoned += 1,
        }
        if self.frame_history == 0 {
            return;
        }
        if self.frames.len() == self.frame_history {
            self.frames.pop_front();
        }
        self.frames.push_back(FrameLog { status, commands });
    }
}

impl GraphicsContext for HeadlessContext {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn surface_size(&self) -> SurfaceSize {
        self.size
    }

    fn create(&mut self, label: &str, descriptor: &ResourceDescriptor<'_>) -> Result<RawHandle, String> {
        if let Some(reason) = self.fail_next_create.take() {
            return Err(reason);
        }
        descriptor.validate()?;

        let mut object = HeadlessObject {
            kind: descriptor.kind(),
            label: label.to_string(),
            size: None,
            attachments: None,
            depth: false,
        };

        match *descriptor {
            ResourceDescriptor::Texture { width, height, format, .. } => {
                object.size = Some(SurfaceSize::new(width, height));
                object.depth = format.is_depth();
            }
            ResourceDescriptor::ColorTarget { width, height } => {
                object.size = Some(SurfaceSize::new(width, height));
            }
            ResourceDescriptor::DepthTarget { width, height } => {
                object.size = Some(SurfaceSize::new(width, height));
                object.depth = true;
            }
            ResourceDescriptor::Framebuffer { color, depth } => {
                for attachment in [color, depth] {
                    if !self.objects.contains_key(&attachment) {
                        return Err(format!("attachment {} is not a live object", attachment.get()));
                    }
                }
                object.attachments = Some((color, depth));
            }
            ResourceDescriptor::Mesh { .. } | ResourceDescriptor::Program(_) => {}
        }

        let raw = RawHandle::new(self.next_name).ok_or_else(|| "object names exhausted".to_string())?;
        self.next_name += 1;
        self.objects.insert(raw, object);
        self.created += 1;
        Ok(raw)
    }

    fn destroy(&mut self, _kind: ResourceKind, raw: RawHandle) {
        if self.objects.remove(&raw).is_some() {
            self.destroyed += 1;
        }
    }

    fn write_texture(&mut self, raw: RawHandle, pixels: &[u8]) -> Result<(), String> {
        let object = self.objects.get(&raw).ok_or("unknown texture")?;
        let size = object.size.ok_or("object has no texels")?;
        if object.kind != ResourceKind::Texture || object.depth {
            return Err(format!("'{}' is not a color texture", object.label));
        }
        let expected = size.width as usize * size.height as usize * 4;
        if pixels.len() != expected {
            return Err(format!("texel payload is {} bytes, expected {expected}", pixels.len()));
        }
        Ok(())
    }

    fn bind(&mut self, kind: ResourceKind, raw: RawHandle) {
        match kind {
            ResourceKind::Framebuffer => self.bound.framebuffer = Some(raw),
            ResourceKind::Program => {
                self.bound.program = Some(raw);
                self.bound.uniforms.clear();
                self.bound.textures.clear();
            }
            ResourceKind::Mesh => self.bound.mesh = Some(raw),
            ResourceKind::Texture => {
                let slot = self.bound.texture_slot.unwrap_or(Location(0));
                self.bound.textures.insert(slot, raw);
            }
            ResourceKind::ColorTarget | ResourceKind::DepthTarget => {}
        }
        self.record(Command::Bind { kind, raw });
    }

    fn framebuffer_status(&self, framebuffer: RawHandle) -> Result<(), String> {
        if self.fail_framebuffers {
            return Err("driver reported incomplete attachment".into());
        }
        let fb = self.objects.get(&framebuffer).ok_or("unknown framebuffer")?;
        let (color, depth) = fb.attachments.ok_or("not a framebuffer")?;
        let color = self.objects.get(&color).ok_or("color attachment was destroyed")?;
        let depth = self.objects.get(&depth).ok_or("depth attachment was destroyed")?;
        if color.depth || !depth.depth {
            return Err("attachment formats are swapped".into());
        }
        if color.size != depth.size {
            return Err(format!("attachment sizes differ: {:?} vs {:?}", color.size, depth.size));
        }
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), String> {
        if self.fail_begin {
            return Err("no presentable image".into());
        }
        if self.recording.is_some() {
            self.finish(FrameStatus::Abandoned);
        }
        self.recording = Some(Vec::new());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.bound.viewport = Some(viewport);
        self.record(Command::Viewport(viewport));
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) {
        let framebuffer = self.bound.framebuffer;
        self.record(Command::Clear { framebuffer, color, depth });
    }

    fn select_texture_slot(&mut self, slot: Location) {
        self.bound.texture_slot = Some(slot);
    }

    fn set_uniform(&mut self, location: Location, value: UniformValue) {
        self.bound.uniforms.insert(location, value);
    }

    fn draw(&mut self) {
        let call = DrawCall {
            framebuffer: self.bound.framebuffer,
            program: self.bound.program,
            mesh: self.bound.mesh,
            textures: self.bound.textures.clone(),
            uniforms: self.bound.uniforms.clone(),
            viewport: self.bound.viewport,
        };
        self.record(Command::Draw(call));
    }

    fn present(&mut self) -> Result<(), String> {
        if self.recording.is_none() {
            return Err("present without begin_frame".into());
        }
        self.finish(FrameStatus::Presented);
        Ok(())
    }

    fn abandon_frame(&mut self) {
        self.finish(FrameStatus::Abandoned);
    }

    fn live_objects(&self) -> usize {
        self.objects.len()
    }
}
