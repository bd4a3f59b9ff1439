use crate::renderer::vertex::Vertex;

/// CPU-side triangle mesh. GPU upload happens lazily in the renderer.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Unit cube centered at the origin, one quad per face.
    pub fn cube() -> Self {
        let h = 0.5;
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (n, u, vv)) in faces.iter().enumerate() {
            let base = (face * 4) as u32;
            for (du, dv, uv) in [
                (-1.0, -1.0, [0.0, 1.0]),
                (1.0, -1.0, [1.0, 1.0]),
                (1.0, 1.0, [1.0, 0.0]),
                (-1.0, 1.0, [0.0, 0.0]),
            ] {
                let pos = [
                    h * (n[0] + du * u[0] + dv * vv[0]),
                    h * (n[1] + du * u[1] + dv * vv[1]),
                    h * (n[2] + du * u[2] + dv * vv[2]),
                ];
                vertices.push(Vertex::new(pos, *n, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }

    /// Unit quad in the XZ plane facing +Y, centered at the origin.
    pub fn plane() -> Self {
        let n = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex::new([-0.5, 0.0, 0.5], n, [0.0, 1.0]),
            Vertex::new([0.5, 0.0, 0.5], n, [1.0, 1.0]),
            Vertex::new([0.5, 0.0, -0.5], n, [1.0, 0.0]),
            Vertex::new([-0.5, 0.0, -0.5], n, [0.0, 0.0]),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];
        Self { vertices, indices }
    }
}
