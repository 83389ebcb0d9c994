//! UI 管线的两个 shader，直接生成 SPIR-V
//!
//! vertex：像素坐标经 push constant 的 scale/translate 变换到 clip space，
//! 颜色和 UV 原样传递。fragment：combined image sampler 采样结果乘以顶点色。

use crate::shader::spirv::{self, decoration, exec_model, op, storage, ModuleWriter};

/// 等价的 GLSL：
/// ```glsl
/// layout(location = 0) in vec2 a_pos;
/// layout(location = 1) in vec2 a_uv;
/// layout(location = 2) in vec4 a_color;
/// layout(push_constant) uniform Pc { vec2 scale; vec2 translate; } pc;
/// layout(location = 0) out vec4 v_color;
/// layout(location = 1) out vec2 v_uv;
/// void main() {
///     v_color = a_color;
///     v_uv = a_uv;
///     gl_Position = vec4(a_pos * pc.scale + pc.translate, 0.0, 1.0);
/// }
/// ```
pub fn ui_vertex_shader() -> Vec<u32> {
    // id 分配：
    //  1 void                2 fn void()           3 f32
    //  4 vec2                5 vec4
    //  6 ptr Input vec2      7 ptr Input vec4
    //  8 ptr Output vec2     9 ptr Output vec4
    // 10 struct Pc          11 ptr PushConstant Pc
    // 12 ptr PushConstant vec2                    13 i32
    // 14 const 0i           15 const 1i
    // 16 const 0.0f         17 const 1.0f
    // 18 a_pos  19 a_uv  20 a_color  21 v_color  22 v_uv  23 gl_Position  24 pc
    // 25 main  26 label  27..38 临时值
    let mut m = ModuleWriter::new(39);

    m.op(op::CAPABILITY, &[1]); // Shader
    m.op(op::MEMORY_MODEL, &[0, 1]); // Logical GLSL450
    m.op_with_string(
        op::ENTRY_POINT,
        &[exec_model::VERTEX, 25],
        "main",
        &[18, 19, 20, 21, 22, 23],
    );

    // decorations
    m.op(op::DECORATE, &[18, decoration::LOCATION, 0]);
    m.op(op::DECORATE, &[19, decoration::LOCATION, 1]);
    m.op(op::DECORATE, &[20, decoration::LOCATION, 2]);
    m.op(op::DECORATE, &[21, decoration::LOCATION, 0]);
    m.op(op::DECORATE, &[22, decoration::LOCATION, 1]);
    m.op(op::DECORATE, &[23, decoration::BUILT_IN, spirv::BUILT_IN_POSITION]);
    m.op(op::DECORATE, &[10, decoration::BLOCK]);
    m.op(op::MEMBER_DECORATE, &[10, 0, decoration::OFFSET, 0]);
    m.op(op::MEMBER_DECORATE, &[10, 1, decoration::OFFSET, 8]);

    // types & constants
    m.op(op::TYPE_VOID, &[1]);
    m.op(op::TYPE_FUNCTION, &[2, 1]);
    m.op(op::TYPE_FLOAT, &[3, 32]);
    m.op(op::TYPE_VECTOR, &[4, 3, 2]);
    m.op(op::TYPE_VECTOR, &[5, 3, 4]);
    m.op(op::TYPE_POINTER, &[6, storage::INPUT, 4]);
    m.op(op::TYPE_POINTER, &[7, storage::INPUT, 5]);
    m.op(op::TYPE_POINTER, &[8, storage::OUTPUT, 4]);
    m.op(op::TYPE_POINTER, &[9, storage::OUTPUT, 5]);
    m.op(op::TYPE_STRUCT, &[10, 4, 4]);
    m.op(op::TYPE_POINTER, &[11, storage::PUSH_CONSTANT, 10]);
    m.op(op::TYPE_POINTER, &[12, storage::PUSH_CONSTANT, 4]);
    m.op(op::TYPE_INT, &[13, 32, 1]);
    m.op(op::CONSTANT, &[13, 14, 0]);
    m.op(op::CONSTANT, &[13, 15, 1]);
    m.op(op::CONSTANT, &[3, 16, 0.0f32.to_bits()]);
    m.op(op::CONSTANT, &[3, 17, 1.0f32.to_bits()]);

    // global variables
    m.op(op::VARIABLE, &[6, 18, storage::INPUT]);
    m.op(op::VARIABLE, &[6, 19, storage::INPUT]);
    m.op(op::VARIABLE, &[7, 20, storage::INPUT]);
    m.op(op::VARIABLE, &[9, 21, storage::OUTPUT]);
    m.op(op::VARIABLE, &[8, 22, storage::OUTPUT]);
    m.op(op::VARIABLE, &[9, 23, storage::OUTPUT]);
    m.op(op::VARIABLE, &[11, 24, storage::PUSH_CONSTANT]);

    // main
    m.op(op::FUNCTION, &[1, 25, 0, 2]);
    m.op(op::LABEL, &[26]);
    m.op(op::LOAD, &[5, 27, 20]); // a_color
    m.op(op::STORE, &[21, 27]);
    m.op(op::LOAD, &[4, 28, 19]); // a_uv
    m.op(op::STORE, &[22, 28]);
    m.op(op::LOAD, &[4, 29, 18]); // a_pos
    m.op(op::ACCESS_CHAIN, &[12, 30, 24, 14]); // pc.scale
    m.op(op::LOAD, &[4, 31, 30]);
    m.op(op::F_MUL, &[4, 32, 29, 31]);
    m.op(op::ACCESS_CHAIN, &[12, 33, 24, 15]); // pc.translate
    m.op(op::LOAD, &[4, 34, 33]);
    m.op(op::F_ADD, &[4, 35, 32, 34]);
    m.op(op::COMPOSITE_EXTRACT, &[3, 36, 35, 0]);
    m.op(op::COMPOSITE_EXTRACT, &[3, 37, 35, 1]);
    m.op(op::COMPOSITE_CONSTRUCT, &[5, 38, 36, 37, 16, 17]);
    m.op(op::STORE, &[23, 38]);
    m.op(op::RETURN, &[]);
    m.op(op::FUNCTION_END, &[]);

    m.into_words()
}

/// 等价的 GLSL：
/// ```glsl
/// layout(location = 0) in vec4 v_color;
/// layout(location = 1) in vec2 v_uv;
/// layout(set = 0, binding = 0) uniform sampler2D u_texture;
/// layout(location = 0) out vec4 out_color;
/// void main() {
///     out_color = v_color * texture(u_texture, v_uv);
/// }
/// ```
pub fn ui_fragment_shader() -> Vec<u32> {
    // id 分配：
    //  1 void  2 fn void()  3 f32  4 vec2  5 vec4
    //  6 ptr Input vec4  7 ptr Input vec2  8 ptr Output vec4
    //  9 image 2D  10 sampled image  11 ptr UniformConstant
    // 12 v_color  13 v_uv  14 out_color  15 u_texture
    // 16 main  17 label  18..22 临时值
    let mut m = ModuleWriter::new(23);

    m.op(op::CAPABILITY, &[1]); // Shader
    m.op(op::MEMORY_MODEL, &[0, 1]); // Logical GLSL450
    m.op_with_string(op::ENTRY_POINT, &[exec_model::FRAGMENT, 16], "main", &[12, 13, 14]);
    m.op(op::EXECUTION_MODE, &[16, spirv::EXEC_MODE_ORIGIN_UPPER_LEFT]);

    // decorations
    m.op(op::DECORATE, &[12, decoration::LOCATION, 0]);
    m.op(op::DECORATE, &[13, decoration::LOCATION, 1]);
    m.op(op::DECORATE, &[14, decoration::LOCATION, 0]);
    m.op(op::DECORATE, &[15, decoration::DESCRIPTOR_SET, 0]);
    m.op(op::DECORATE, &[15, decoration::BINDING, 0]);

    // types
    m.op(op::TYPE_VOID, &[1]);
    m.op(op::TYPE_FUNCTION, &[2, 1]);
    m.op(op::TYPE_FLOAT, &[3, 32]);
    m.op(op::TYPE_VECTOR, &[4, 3, 2]);
    m.op(op::TYPE_VECTOR, &[5, 3, 4]);
    m.op(op::TYPE_POINTER, &[6, storage::INPUT, 5]);
    m.op(op::TYPE_POINTER, &[7, storage::INPUT, 4]);
    m.op(op::TYPE_POINTER, &[8, storage::OUTPUT, 5]);
    // sampled type f32, Dim2D, no depth, no array, no ms, sampled, format unknown
    m.op(op::TYPE_IMAGE, &[9, 3, 1, 0, 0, 0, 1, 0]);
    m.op(op::TYPE_SAMPLED_IMAGE, &[10, 9]);
    m.op(op::TYPE_POINTER, &[11, storage::UNIFORM_CONSTANT, 10]);

    // global variables
    m.op(op::VARIABLE, &[6, 12, storage::INPUT]);
    m.op(op::VARIABLE, &[7, 13, storage::INPUT]);
    m.op(op::VARIABLE, &[8, 14, storage::OUTPUT]);
    m.op(op::VARIABLE, &[11, 15, storage::UNIFORM_CONSTANT]);

    // main
    m.op(op::FUNCTION, &[1, 16, 0, 2]);
    m.op(op::LABEL, &[17]);
    m.op(op::LOAD, &[5, 18, 12]); // v_color
    m.op(op::LOAD, &[10, 19, 15]); // u_texture
    m.op(op::LOAD, &[4, 20, 13]); // v_uv
    m.op(op::IMAGE_SAMPLE_IMPLICIT_LOD, &[5, 21, 19, 20]);
    m.op(op::F_MUL, &[5, 22, 18, 21]);
    m.op(op::STORE, &[14, 22]);
    m.op(op::RETURN, &[]);
    m.op(op::FUNCTION_END, &[]);

    m.into_words()
}
