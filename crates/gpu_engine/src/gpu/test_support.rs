//! Mock backend objects shared by the GPU layer's unit tests

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::buffer::{GpuBuffer, GpuBufferDesc, GpuBufferType, MapFlags};
use super::command_list::{GpuCommandContext, GpuCommandList};
use super::defs::{ObjectId, PrimitiveType, ShaderStage};
use super::index_data::GpuIndexData;
use super::manager::{GpuBackend, GpuManager, WindowInfo};
use super::pipeline::{GpuPipeline, GpuPipelineDesc};
use super::pixel_format::PixelFormat;
use super::program::{GpuProgram, GpuProgramDesc};
use super::query_pool::{GpuQueryPool, GpuQueryPoolDesc};
use super::resource::{GpuResourceSet, GpuResourceSetLayoutDesc, GpuResourceType};
use super::state::{
    GpuBlendState, GpuDepthStencilState, GpuRasterizerState, GpuRasterizerStateDesc, GpuSamplerState,
    GpuSamplerStateDesc, GpuState,
};
use super::texture::{GpuTexture, GpuTextureDesc, GpuTextureImageRef, GpuTextureViewDesc};
use super::vertex_data::{GpuVertexData, GpuVertexDataLayoutDesc, VertexAttribute, VertexSemantic};
use crate::foundation::math::{IVec2, IntBox, IntRect};

pub fn main_window() -> WindowInfo {
    WindowInfo {
        width: 640,
        height: 480,
        format: PixelFormat::R8G8B8A8,
    }
}

pub struct MockTexture {
    desc: GpuTextureDesc,
    id: ObjectId,
    pub updates: RefCell<Vec<(IntBox, u32, u32)>>,
    pub mipmap_generations: Cell<u32>,
}

impl GpuTexture for MockTexture {
    fn desc(&self) -> &GpuTextureDesc {
        &self.desc
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn update_impl(&self, area: &IntBox, _data: &[u8], mip: u32, layer: u32) {
        self.updates.borrow_mut().push((*area, mip, layer));
    }

    fn generate_mipmap(&self) {
        self.mipmap_generations.set(self.mipmap_generations.get() + 1);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn mock_texture(desc: GpuTextureDesc) -> Rc<dyn GpuTexture> {
    Rc::new(MockTexture {
        desc,
        id: ObjectId::next(),
        updates: RefCell::default(),
        mipmap_generations: Cell::new(0),
    })
}

/// Query pool whose timestamps count the queries ended so far
pub struct MockQueryPool {
    desc: GpuQueryPoolDesc,
    id: ObjectId,
    results: RefCell<Vec<u64>>,
    pub ended: Cell<u64>,
}

impl GpuQueryPool for MockQueryPool {
    fn desc(&self) -> &GpuQueryPoolDesc {
        &self.desc
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn reset_impl(&self, start: u32, count: u32) {
        let start = start as usize;
        self.results.borrow_mut()[start..start + count as usize].fill(0);
    }

    fn results_impl(&self, start: u32, results: &mut [u64]) {
        let start = start as usize;
        results.copy_from_slice(&self.results.borrow()[start..start + results.len()]);
    }

    fn end_impl(&self, index: u32) {
        self.ended.set(self.ended.get() + 1);
        self.results.borrow_mut()[index as usize] = self.ended.get();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn mock_query_pool(desc: GpuQueryPoolDesc) -> Rc<dyn GpuQueryPool> {
    Rc::new(MockQueryPool {
        id: ObjectId::next(),
        results: RefCell::new(vec![0; desc.count as usize]),
        ended: Cell::new(0),
        desc,
    })
}

pub struct MockBuffer {
    desc: GpuBufferDesc,
    id: ObjectId,
    pub data: RefCell<Vec<u8>>,
    pub writes: RefCell<Vec<(usize, usize, MapFlags)>>,
}

impl GpuBuffer for MockBuffer {
    fn desc(&self) -> &GpuBufferDesc {
        &self.desc
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn write_impl(&self, offset: usize, data: &[u8], flags: MapFlags) {
        self.data.borrow_mut()[offset..offset + data.len()].copy_from_slice(data);
        self.writes.borrow_mut().push((offset, data.len(), flags));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn mock_buffer(desc: GpuBufferDesc) -> Rc<dyn GpuBuffer> {
    Rc::new(MockBuffer {
        id: ObjectId::next(),
        data: RefCell::new(vec![0; desc.size]),
        writes: RefCell::default(),
        desc,
    })
}

/// Records every replayed command as a short string
#[derive(Default)]
pub struct RecordingContext {
    pub calls: Vec<String>,
}

impl GpuCommandContext for RecordingContext {
    fn bind_pipeline(&mut self, _pipeline: &Rc<GpuPipeline>) {
        self.calls.push("bind_pipeline".to_owned());
    }

    fn bind_resource_set(&mut self, index: usize, _resources: &Rc<GpuResourceSet>) {
        self.calls.push(format!("bind_resource_set {index}"));
    }

    fn set_blend_state(&mut self, _state: &Rc<GpuBlendState>) {
        self.calls.push("set_blend_state".to_owned());
    }

    fn set_depth_stencil_state(&mut self, _state: &Rc<GpuDepthStencilState>) {
        self.calls.push("set_depth_stencil_state".to_owned());
    }

    fn set_rasterizer_state(&mut self, _state: &Rc<GpuRasterizerState>) {
        self.calls.push("set_rasterizer_state".to_owned());
    }

    fn set_viewport(&mut self, viewport: IntRect) {
        self.calls.push(format!(
            "set_viewport {},{} {}x{}",
            viewport.x, viewport.y, viewport.width, viewport.height
        ));
    }

    fn set_scissor(&mut self, enable: bool, scissor: IntRect) {
        self.calls.push(format!(
            "set_scissor {} {},{} {}x{}",
            enable, scissor.x, scissor.y, scissor.width, scissor.height
        ));
    }

    fn draw(&mut self, primitive: PrimitiveType, vertices: &Rc<GpuVertexData>, _indices: Option<&Rc<GpuIndexData>>) {
        self.calls.push(format!("draw {:?} {}", primitive, vertices.count()));
    }

    fn end_query(&mut self, pool: &Rc<dyn GpuQueryPool>, index: u32) {
        pool.end(index);
        self.calls.push(format!("end_query {index}"));
    }
}

/// Backend which creates mock objects and records submissions
#[derive(Default)]
pub struct MockBackend {
    counters: RefCell<HashMap<&'static str, usize>>,
    pub submitted: RefCell<Vec<Vec<String>>>,
    pub blits: Cell<u32>,
    pub frames: Cell<u32>,
}

impl MockBackend {
    pub fn counters(&self) -> HashMap<&'static str, usize> {
        self.counters.borrow().clone()
    }

    fn count(&self, what: &'static str) {
        *self.counters.borrow_mut().entry(what).or_default() += 1;
    }
}

impl GpuBackend for MockBackend {
    fn window(&self) -> WindowInfo {
        main_window()
    }

    fn create_buffer(&self, desc: GpuBufferDesc) -> Rc<dyn GpuBuffer> {
        self.count("buffer");
        mock_buffer(desc)
    }

    fn create_texture(&self, desc: GpuTextureDesc) -> Rc<dyn GpuTexture> {
        self.count("texture");
        mock_texture(desc)
    }

    fn create_texture_view(&self, desc: GpuTextureViewDesc) -> Rc<dyn GpuTexture> {
        self.count("texture_view");
        mock_texture(desc.texture_desc())
    }

    fn create_query_pool(&self, desc: GpuQueryPoolDesc) -> Rc<dyn GpuQueryPool> {
        self.count("query_pool");
        mock_query_pool(desc)
    }

    fn create_program(&self, desc: GpuProgramDesc) -> Rc<GpuProgram> {
        self.count("program");
        Rc::new(GpuState::new(desc))
    }

    fn create_pipeline(&self, desc: GpuPipelineDesc) -> Rc<GpuPipeline> {
        self.count("pipeline");
        Rc::new(GpuState::new(desc))
    }

    fn create_rasterizer_state(&self, desc: GpuRasterizerStateDesc) -> Rc<GpuRasterizerState> {
        self.count("rasterizer_state");
        Rc::new(GpuState::new(desc))
    }

    fn create_sampler_state(&self, desc: GpuSamplerStateDesc) -> Rc<GpuSamplerState> {
        self.count("sampler_state");
        Rc::new(GpuState::new(desc))
    }

    fn submit_render_pass(&self, cmd_list: &GpuCommandList<'_>) {
        let mut recorder = RecordingContext::default();
        cmd_list.execute(&mut recorder);
        self.submitted.borrow_mut().push(recorder.calls);
    }

    fn blit(
        &self,
        _source: &GpuTextureImageRef,
        _dest: &GpuTextureImageRef,
        _source_pos: IVec2,
        _dest_pos: IVec2,
        _size: IVec2,
    ) {
        self.blits.set(self.blits.get() + 1);
    }

    fn end_frame(&self) {
        self.frames.set(self.frames.get() + 1);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn mock_manager() -> GpuManager {
    GpuManager::new(Box::<MockBackend>::default(), true)
}

pub fn mock_backend(manager: &GpuManager) -> &MockBackend {
    manager
        .backend()
        .as_any()
        .downcast_ref::<MockBackend>()
        .expect("manager is not using the mock backend")
}

pub fn mock_pipeline(manager: &GpuManager) -> Rc<GpuPipeline> {
    let vertex = manager.create_program(GpuProgramDesc::new(ShaderStage::Vertex, "test.vert", vec![1]));
    let fragment = manager.create_program(GpuProgramDesc::new(ShaderStage::Fragment, "test.frag", vec![1]));

    manager.create_pipeline(GpuPipelineDesc::default().with_program(vertex).with_program(fragment))
}

pub fn mock_resource_set(manager: &GpuManager) -> Rc<GpuResourceSet> {
    let layout = manager.create_resource_set_layout(
        GpuResourceSetLayoutDesc::with_slot_count(1).with_slot(0, GpuResourceType::UniformBuffer),
    );
    manager.create_resource_set(&layout)
}

pub fn mock_vertex_data(manager: &GpuManager, count: usize) -> Rc<GpuVertexData> {
    let layout = manager.get_vertex_data_layout(
        &GpuVertexDataLayoutDesc::default()
            .with_binding(12)
            .with_attribute(VertexAttribute::float(VertexSemantic::Position, 3, 0, 0)),
    );
    let buffer = manager.create_buffer(GpuBufferDesc::new(GpuBufferType::Vertex, 12 * count.max(1)));

    manager.create_vertex_data(count, layout, vec![buffer])
}
