use glam::{Mat4, Quat};

use crate::stage::Prim;
use crate::value::Value;

// ops apply in xformOpOrder order, outermost first; without a declared
// order only a bare xformOp:transform contributes
pub fn local_transform(prim: &Prim) -> Mat4 {
    let Some(order) = prim.attr("xformOpOrder").and_then(Value::as_token_array) else {
        if let Some(m) = prim.attr("xformOp:transform").and_then(Value::as_matrix) {
            return m;
        }
        return Mat4::IDENTITY;
    };

    let mut local = Mat4::IDENTITY;
    for op in order {
        if let Some(m) = op_matrix(prim, op) {
            local *= m;
        }
    }
    local
}

fn op_matrix(prim: &Prim, op_name: &str) -> Option<Mat4> {
    let mut parts = op_name.split(':');
    if parts.next() != Some("xformOp") {
        return None;
    }
    let kind = parts.next()?;
    let value = prim.attr(op_name)?;

    match kind {
        "translate" => Some(Mat4::from_translation(value.as_vec3()?)),
        "scale" => Some(Mat4::from_scale(value.as_vec3()?)),
        "rotateX" => Some(Mat4::from_rotation_x(value.as_float()?.to_radians())),
        "rotateY" => Some(Mat4::from_rotation_y(value.as_float()?.to_radians())),
        "rotateZ" => Some(Mat4::from_rotation_z(value.as_float()?.to_radians())),
        "rotateXYZ" => {
            // intrinsic XYZ: R_z * R_y * R_x
            let deg = value.as_vec3()?;
            Some(
                Mat4::from_rotation_z(deg.z.to_radians())
                    * Mat4::from_rotation_y(deg.y.to_radians())
                    * Mat4::from_rotation_x(deg.x.to_radians()),
            )
        }
        "orient" => {
            let q = value.as_vec4()?;
            Some(Mat4::from_quat(Quat::from_xyzw(q.x, q.y, q.z, q.w).normalize()))
        }
        "transform" => value.as_matrix(),
        _ => None,
    }
}
