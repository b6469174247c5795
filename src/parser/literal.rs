use glam::{Mat4, Vec2, Vec3, Vec4};

use super::StageParser;
use crate::tokenizer::TokenKind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Double,
    String,
    Token,
    Asset,
    Vec2,
    Vec3,
    Vec4,
    Matrix,
}

impl ScalarType {
    pub fn from_type_name(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" | "half" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            "token" => Self::Token,
            "asset" => Self::Asset,
            "float2" | "double2" | "half2" | "texCoord2f" | "texCoord2d" | "texCoord2h" => {
                Self::Vec2
            }
            "float3" | "double3" | "half3" | "point3f" | "normal3f" | "vector3f" | "color3f" => {
                Self::Vec3
            }
            "float4" | "double4" | "half4" | "quath" | "quatf" | "quatd" | "color4f" => Self::Vec4,
            "matrix4d" => Self::Matrix,
            _ => return None,
        };
        Some(ty)
    }
}

impl StageParser {
    pub(super) fn eat_number(&mut self) -> Option<f64> {
        match self.peek() {
            TokenKind::Integer(v) => {
                let v = *v;
                self.advance();
                Some(v as f64)
            }
            TokenKind::Float(v) => {
                let v = *v;
                self.advance();
                Some(v)
            }
            _ => None,
        }
    }

    pub(super) fn parse_typed_value(&mut self, ty: ScalarType, is_array: bool) -> Option<Value> {
        if !is_array {
            return self.parse_scalar_value(ty);
        }
        match ty {
            ScalarType::Bool => Some(Value::BoolArray(self.parse_array(Self::parse_bool)?)),
            ScalarType::Int => Some(Value::IntArray(self.parse_array(Self::parse_i32)?)),
            ScalarType::Float => Some(Value::FloatArray(
                self.parse_array(|p| p.eat_number().map(|v| v as f32))?,
            )),
            ScalarType::Double => Some(Value::DoubleArray(self.parse_array(Self::eat_number)?)),
            ScalarType::String => Some(Value::StringArray(self.parse_array(Self::eat_string)?)),
            ScalarType::Token => Some(Value::TokenArray(self.parse_array(Self::eat_string)?)),
            ScalarType::Asset => Some(Value::AssetArray(self.parse_array(Self::parse_asset)?)),
            ScalarType::Vec2 => Some(Value::Vec2Array(self.parse_array(Self::parse_vec2)?)),
            ScalarType::Vec3 => Some(Value::Vec3Array(self.parse_array(Self::parse_vec3)?)),
            ScalarType::Vec4 => Some(Value::Vec4Array(self.parse_array(Self::parse_vec4)?)),
            ScalarType::Matrix => Some(Value::MatrixArray(self.parse_array(Self::parse_matrix)?)),
        }
    }

    fn parse_scalar_value(&mut self, ty: ScalarType) -> Option<Value> {
        match ty {
            ScalarType::Bool => self.parse_bool().map(Value::Bool),
            ScalarType::Int => self.parse_i32().map(Value::Int),
            ScalarType::Float => self.eat_number().map(|v| Value::Float(v as f32)),
            ScalarType::Double => self.eat_number().map(Value::Double),
            ScalarType::String => self.eat_string().map(Value::String),
            ScalarType::Token => self.eat_string().map(Value::Token),
            ScalarType::Asset => self.parse_asset().map(Value::Asset),
            ScalarType::Vec2 => self.parse_vec2().map(Value::Vec2),
            ScalarType::Vec3 => self.parse_vec3().map(Value::Vec3),
            ScalarType::Vec4 => self.parse_vec4().map(Value::Vec4),
            ScalarType::Matrix => self.parse_matrix().map(Value::Matrix),
        }
    }

    // `[ item, item, ... ]`, trailing comma allowed
    fn parse_array<T>(&mut self, mut item: impl FnMut(&mut Self) -> Option<T>) -> Option<Vec<T>> {
        if !self.eat(&TokenKind::LeftBracket) {
            return None;
        }
        let mut out = Vec::new();
        loop {
            if self.eat(&TokenKind::RightBracket) {
                return Some(out);
            }
            if self.peek() == &TokenKind::Eof {
                return None;
            }
            out.push(item(self)?);
            if !self.eat(&TokenKind::Comma) {
                return if self.eat(&TokenKind::RightBracket) {
                    Some(out)
                } else {
                    None
                };
            }
        }
    }

    fn parse_bool(&mut self) -> Option<bool> {
        match self.peek() {
            TokenKind::Identifier(word) if word == "true" => {
                self.advance();
                Some(true)
            }
            TokenKind::Identifier(word) if word == "false" => {
                self.advance();
                Some(false)
            }
            TokenKind::Integer(v) => {
                let v = *v;
                self.advance();
                Some(v != 0)
            }
            _ => None,
        }
    }

    fn parse_i32(&mut self) -> Option<i32> {
        match self.peek() {
            TokenKind::Integer(v) => {
                let v = *v as i32;
                self.advance();
                Some(v)
            }
            _ => None,
        }
    }

    fn parse_asset(&mut self) -> Option<String> {
        match self.peek() {
            TokenKind::AssetPath(_) => match self.advance() {
                TokenKind::AssetPath(path) => Some(path),
                _ => unreachable!(),
            },
            _ => None,
        }
    }

    fn parse_tuple(&mut self, n: usize, out: &mut [f32]) -> Option<()> {
        if !self.eat(&TokenKind::LeftParen) {
            return None;
        }
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            if i > 0 && !self.eat(&TokenKind::Comma) {
                return None;
            }
            *slot = self.eat_number()? as f32;
        }
        if !self.eat(&TokenKind::RightParen) {
            return None;
        }
        Some(())
    }

    fn parse_vec2(&mut self) -> Option<Vec2> {
        let mut v = [0.0; 2];
        self.parse_tuple(2, &mut v)?;
        Some(Vec2::from_array(v))
    }

    fn parse_vec3(&mut self) -> Option<Vec3> {
        let mut v = [0.0; 3];
        self.parse_tuple(3, &mut v)?;
        Some(Vec3::from_array(v))
    }

    fn parse_vec4(&mut self) -> Option<Vec4> {
        let mut v = [0.0; 4];
        self.parse_tuple(4, &mut v)?;
        Some(Vec4::from_array(v))
    }

    // row-major rows, stored as columns so the result multiplies
    // column vectors directly
    fn parse_matrix(&mut self) -> Option<Mat4> {
        if !self.eat(&TokenKind::LeftParen) {
            return None;
        }
        let mut rows = [Vec4::ZERO; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            if i > 0 && !self.eat(&TokenKind::Comma) {
                return None;
            }
            *row = self.parse_vec4()?;
        }
        if !self.eat(&TokenKind::RightParen) {
            return None;
        }
        Some(Mat4::from_cols(rows[0], rows[1], rows[2], rows[3]))
    }

    // ---- recovery ----

    // consume one balanced value: a bracketed group or a single token
    // (an asset path keeps an adjacent prim-path suffix with it)
    pub(super) fn skip_balanced_value(&mut self) {
        match self.peek() {
            TokenKind::LeftParen => {
                self.advance();
                self.skip_balanced(TokenKind::LeftParen);
            }
            TokenKind::LeftBracket => {
                self.advance();
                self.skip_balanced(TokenKind::LeftBracket);
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.skip_balanced(TokenKind::LeftBrace);
            }
            TokenKind::Eof => {}
            _ => {
                let first = self.advance();
                if matches!(first, TokenKind::AssetPath(_))
                    && matches!(self.peek(), TokenKind::PrimPath(_))
                {
                    self.advance();
                }
            }
        }
    }

    // scan past the closer matching an already-consumed opener
    pub(super) fn skip_balanced(&mut self, opener: TokenKind) {
        let closer = match opener {
            TokenKind::LeftParen => TokenKind::RightParen,
            TokenKind::LeftBracket => TokenKind::RightBracket,
            TokenKind::LeftBrace => TokenKind::RightBrace,
            _ => return,
        };
        let mut depth = 1usize;
        loop {
            let token = self.advance();
            if token == TokenKind::Eof {
                return;
            }
            if token == opener {
                depth += 1;
            } else if token == closer {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }
}
