//! 手写 SPIR-V module 的最小编码器
//!
//! UI 管线只需要两个很小的 shader，直接在代码里拼出 word stream，
//! 不依赖外部的 shader 编译器。

pub const SPIRV_MAGIC: u32 = 0x0723_0203;
pub const SPIRV_VERSION_1_0: u32 = 0x0001_0000;

/// 用到的 opcode 子集
pub mod op {
    pub const MEMORY_MODEL: u16 = 14;
    pub const ENTRY_POINT: u16 = 15;
    pub const EXECUTION_MODE: u16 = 16;
    pub const CAPABILITY: u16 = 17;
    pub const TYPE_VOID: u16 = 19;
    pub const TYPE_INT: u16 = 21;
    pub const TYPE_FLOAT: u16 = 22;
    pub const TYPE_VECTOR: u16 = 23;
    pub const TYPE_IMAGE: u16 = 25;
    pub const TYPE_SAMPLED_IMAGE: u16 = 27;
    pub const TYPE_STRUCT: u16 = 30;
    pub const TYPE_POINTER: u16 = 32;
    pub const TYPE_FUNCTION: u16 = 33;
    pub const CONSTANT: u16 = 43;
    pub const FUNCTION: u16 = 54;
    pub const FUNCTION_END: u16 = 56;
    pub const VARIABLE: u16 = 59;
    pub const LOAD: u16 = 61;
    pub const STORE: u16 = 62;
    pub const ACCESS_CHAIN: u16 = 65;
    pub const DECORATE: u16 = 71;
    pub const MEMBER_DECORATE: u16 = 72;
    pub const COMPOSITE_CONSTRUCT: u16 = 80;
    pub const COMPOSITE_EXTRACT: u16 = 81;
    pub const IMAGE_SAMPLE_IMPLICIT_LOD: u16 = 87;
    pub const F_ADD: u16 = 129;
    pub const F_MUL: u16 = 133;
    pub const LABEL: u16 = 248;
    pub const RETURN: u16 = 253;
}

/// storage class
pub mod storage {
    pub const UNIFORM_CONSTANT: u32 = 0;
    pub const INPUT: u32 = 1;
    pub const OUTPUT: u32 = 3;
    pub const PUSH_CONSTANT: u32 = 9;
}

/// decoration
pub mod decoration {
    pub const BLOCK: u32 = 2;
    pub const BUILT_IN: u32 = 11;
    pub const LOCATION: u32 = 30;
    pub const BINDING: u32 = 33;
    pub const DESCRIPTOR_SET: u32 = 34;
    pub const OFFSET: u32 = 35;
}

/// execution model
pub mod exec_model {
    pub const VERTEX: u32 = 0;
    pub const FRAGMENT: u32 = 4;
}

pub const BUILT_IN_POSITION: u32 = 0;
pub const EXEC_MODE_ORIGIN_UPPER_LEFT: u32 = 7;

/// 按 section 顺序写 word 的 module writer
///
/// bound 在构造时就要给定（所有 result id 的最大值 + 1）
pub struct ModuleWriter {
    words: Vec<u32>,
}

impl ModuleWriter {
    pub fn new(bound: u32) -> Self {
        let mut writer = Self { words: Vec::with_capacity(256) };
        writer.words.push(SPIRV_MAGIC);
        writer.words.push(SPIRV_VERSION_1_0);
        writer.words.push(0); // generator
        writer.words.push(bound);
        writer.words.push(0); // schema
        writer
    }

    /// 一条普通指令：word count 是 1 + operands.len()
    pub fn op(&mut self, opcode: u16, operands: &[u32]) {
        let word_count = 1 + operands.len() as u32;
        self.words.push((word_count << 16) | opcode as u32);
        self.words.extend_from_slice(operands);
    }

    /// 带字符串 operand 的指令（EntryPoint 用），字符串以 null 结尾、补齐到 word 边界
    pub fn op_with_string(&mut self, opcode: u16, pre: &[u32], name: &str, post: &[u32]) {
        let string_words = Self::encode_string(name);
        let word_count = 1 + pre.len() as u32 + string_words.len() as u32 + post.len() as u32;
        self.words.push((word_count << 16) | opcode as u32);
        self.words.extend_from_slice(pre);
        self.words.extend_from_slice(&string_words);
        self.words.extend_from_slice(post);
    }

    fn encode_string(s: &str) -> Vec<u32> {
        let bytes = s.as_bytes();
        let mut words = Vec::with_capacity(bytes.len() / 4 + 1);
        let mut word = 0u32;
        for (i, &b) in bytes.iter().enumerate() {
            word |= (b as u32) << ((i % 4) * 8);
            if i % 4 == 3 {
                words.push(word);
                word = 0;
            }
        }
        // 最后一个 word 总会被 push，保证 null terminator 存在
        words.push(word);
        words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}
