use glam::{Mat4, Vec2, Vec3, Vec4};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
    Token(String),
    Asset(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Matrix(Mat4),
    BoolArray(Vec<bool>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    TokenArray(Vec<String>),
    AssetArray(Vec<String>),
    Vec2Array(Vec<Vec2>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    MatrixArray(Vec<Mat4>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    // accepts either float width, callers never care which precision
    // the source author picked
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Double(v) => Some(*v as f32),
            Value::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&str> {
        match self {
            Value::Token(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&str> {
        match self {
            Value::Asset(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Value::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Value::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<Mat4> {
        match self {
            Value::Matrix(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_token_array(&self) -> Option<&[String]> {
        match self {
            Value::TokenArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_asset_array(&self) -> Option<&[String]> {
        match self {
            Value::AssetArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2_array(&self) -> Option<&[Vec2]> {
        match self {
            Value::Vec2Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec3_array(&self) -> Option<&[Vec3]> {
        match self {
            Value::Vec3Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec4_array(&self) -> Option<&[Vec4]> {
        match self {
            Value::Vec4Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::BoolArray(_)
                | Value::IntArray(_)
                | Value::FloatArray(_)
                | Value::DoubleArray(_)
                | Value::StringArray(_)
                | Value::TokenArray(_)
                | Value::AssetArray(_)
                | Value::Vec2Array(_)
                | Value::Vec3Array(_)
                | Value::Vec4Array(_)
                | Value::MatrixArray(_)
        )
    }
}
