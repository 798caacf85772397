use std::{fs, path::Path, str::FromStr};

use itertools::Itertools as _;
use thiserror::Error;

use crate::{
    geometry::{FloatType, GpuPatch, Patch, WorldPoint, WorldVector},
    patch_bvh::{BuildTree, BvhSettings, LinearBvh},
};

/// Quad patch mesh loaded from a model file.
#[derive(Clone, Debug)]
pub struct PatchModel {
    patches: Vec<Patch>,
    extents: ModelExtents,
}

/// Rough cylindrical extents of a model standing on the XZ plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModelExtents {
    /// Center of the model base, y is the lowest vertex
    pub center: WorldPoint,
    /// Largest x coordinate of any vertex
    pub radius: FloatType,
    /// Distance between the lowest and the highest vertex
    pub height: FloatType,
}

#[derive(Debug, Error)]
pub enum ModelOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Missing `#` header, not a patch model")]
    MissingHeader,

    #[error("Unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("Expected `{expected}`, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("Failed to parse {what} from `{token}`")]
    ParseError { what: &'static str, token: String },

    #[error("Index count {0} is not a multiple of 4")]
    IndexCount(usize),

    #[error("Vertex index {index} is out of range 1..={vertex_count}")]
    IndexOutOfRange { index: usize, vertex_count: usize },
}

impl PatchModel {
    pub fn with_file(p: impl AsRef<Path>) -> Result<PatchModel, ModelOpenError> {
        let content = fs::read_to_string(p)?;
        Self::parse(&content)
    }

    /// Parses the quad mesh text format:
    ///
    /// ```text
    /// # <vertex count> <index count>
    /// v x y z      (vertex count times)
    /// vn x y z     (vertex count times)
    /// vt u v       (vertex count times, ignored)
    /// f a/_/_ b/_/_ c/_/_ d/_/_   (index count / 4 times, 1-based)
    /// ```
    #[tracing::instrument(skip_all)]
    pub fn parse(content: &str) -> Result<PatchModel, ModelOpenError> {
        let content = content
            .trim_start()
            .strip_prefix('#')
            .ok_or(ModelOpenError::MissingHeader)?;
        let mut tokens = Tokens(content.split_whitespace());

        let vertex_count: usize = tokens.number("vertex count")?;
        let index_count: usize = tokens.number("index count")?;
        if index_count % 4 != 0 {
            return Err(ModelOpenError::IndexCount(index_count));
        }

        let vertices = (0..vertex_count)
            .map(|_| {
                tokens.tag("v")?;
                tokens.point("vertex")
            })
            .collect::<Result<Vec<_>, _>>()?;

        let normals = (0..vertex_count)
            .map(|_| {
                tokens.tag("vn")?;
                Ok(tokens.point("normal")?.coords)
            })
            .collect::<Result<Vec<_>, ModelOpenError>>()?;

        for _ in 0..vertex_count {
            tokens.tag("vt")?;
            tokens.number::<FloatType>("texture coordinate")?;
            tokens.number::<FloatType>("texture coordinate")?;
        }

        // Every index takes at least one byte of input, the header count is not trusted
        let mut indices = Vec::with_capacity(index_count.min(content.len()));
        for _ in 0..(index_count / 4) {
            tokens.tag("f")?;
            for _ in 0..4 {
                indices.push(tokens.face_vertex(vertex_count)?);
            }
        }

        let patches = indices
            .into_iter()
            .tuples()
            .map(|(i1, i2, i3, i4)| {
                let normal = (normals[i1] + normals[i2] + normals[i3] + normals[i4])
                    .try_normalize(0.0)
                    .unwrap_or_else(WorldVector::zeros);
                Patch::new(
                    [vertices[i4], vertices[i1], vertices[i3], vertices[i2]],
                    normal,
                )
            })
            .collect();

        let model = PatchModel {
            patches,
            extents: ModelExtents::of_vertices(&vertices),
        };

        tracing::info!(
            vertex_count,
            patch_count = model.patches.len(),
            "patch model loaded"
        );

        Ok(model)
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn extents(&self) -> &ModelExtents {
        &self.extents
    }

    /// Scales the model around the origin, then moves it by `offset`.
    pub fn transform(&mut self, scale: FloatType, offset: &WorldVector) {
        for patch in self.patches.iter_mut() {
            *patch = patch.transformed(scale, offset);
        }
        self.extents = ModelExtents {
            center: WorldPoint::from(self.extents.center.coords * scale + offset),
            radius: self.extents.radius * scale,
            height: self.extents.height * scale,
        };
    }

    /// Builds the intermediate tree, reordering the model's patches to match it.
    pub fn build_tree(&mut self, settings: &BvhSettings) -> BuildTree {
        BuildTree::build(&mut self.patches, settings)
    }

    /// Builds the flattened BVH, reordering the model's patches to match it.
    pub fn build_bvh(&mut self, settings: &BvhSettings) -> LinearBvh {
        LinearBvh::build(&mut self.patches, settings)
    }

    /// Patches in upload layout, in their current order.
    pub fn gpu_patches(&self) -> Vec<GpuPatch> {
        self.patches.iter().map(Patch::to_gpu).collect()
    }
}

impl ModelExtents {
    fn of_vertices(vertices: &[WorldPoint]) -> ModelExtents {
        if vertices.is_empty() {
            return ModelExtents {
                center: WorldPoint::origin(),
                radius: 0.0,
                height: 0.0,
            };
        }

        let (lowest, highest) = vertices
            .iter()
            .map(|v| v.y)
            .fold((FloatType::INFINITY, FloatType::NEG_INFINITY), |(lo, hi), y| {
                (lo.min(y), hi.max(y))
            });
        let widest = vertices
            .iter()
            .map(|v| v.x)
            .fold(FloatType::NEG_INFINITY, FloatType::max);

        ModelExtents {
            center: WorldPoint::new(0.0, lowest, 0.0),
            radius: widest,
            height: highest - lowest,
        }
    }
}

struct Tokens<'a>(std::str::SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn next(&mut self, what: &'static str) -> Result<&'a str, ModelOpenError> {
        self.0.next().ok_or(ModelOpenError::UnexpectedEof(what))
    }

    fn tag(&mut self, expected: &'static str) -> Result<(), ModelOpenError> {
        let found = self.next(expected)?;
        if found == expected {
            Ok(())
        } else {
            Err(ModelOpenError::UnexpectedToken {
                expected,
                found: found.to_owned(),
            })
        }
    }

    fn number<T: FromStr>(&mut self, what: &'static str) -> Result<T, ModelOpenError> {
        let token = self.next(what)?;
        parse_token(token, what)
    }

    fn point(&mut self, what: &'static str) -> Result<WorldPoint, ModelOpenError> {
        Ok(WorldPoint::new(
            self.number(what)?,
            self.number(what)?,
            self.number(what)?,
        ))
    }

    /// Reads a `vertex/texture/normal` triple and returns the zero-based vertex index.
    fn face_vertex(&mut self, vertex_count: usize) -> Result<usize, ModelOpenError> {
        let token = self.next("face")?;
        let vertex = token.split('/').next().unwrap_or(token);
        let index: usize = parse_token(vertex, "vertex index")?;
        if index == 0 || index > vertex_count {
            return Err(ModelOpenError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(index - 1)
    }
}

fn parse_token<T: FromStr>(token: &str, what: &'static str) -> Result<T, ModelOpenError> {
    token.parse().map_err(|_| ModelOpenError::ParseError {
        what,
        token: token.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch_bvh::DEFAULT_LEAF_THRESHOLD;

    use assert2::{assert, let_assert};
    use test_case::test_case;

    /// Two unit quads next to each other along x, sharing an edge.
    const TWO_QUADS: &str = "\
# 6 8
v 0 0 0
v 1 0 0
v 2 0 0
v 0 1 0
v 1 1 0
v 2 1 0
vn 0 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1
vt 0 0
vt 0 0
vt 0 0
vt 0 0
vt 0 0
vt 0 0
f 1/1/1 2/2/2 5/5/5 4/4/4
f 2/2/2 3/3/3 6/6/6 5/5/5
";

    #[test]
    fn parse_two_quads() {
        let_assert!(Ok(model) = PatchModel::parse(TWO_QUADS));
        assert!(model.patches().len() == 2);

        let patch = &model.patches()[0];
        assert!(patch[0] == WorldPoint::new(0.0, 1.0, 0.0));
        assert!(patch[1] == WorldPoint::new(0.0, 0.0, 0.0));
        assert!(patch[2] == WorldPoint::new(1.0, 1.0, 0.0));
        assert!(patch[3] == WorldPoint::new(1.0, 0.0, 0.0));
        assert!(*patch.normal() == WorldVector::new(0.0, 0.0, 1.0));

        let extents = model.extents();
        assert!(extents.center == WorldPoint::new(0.0, 0.0, 0.0));
        assert!(extents.radius == 2.0);
        assert!(extents.height == 1.0);
    }

    #[test]
    fn header_without_space() {
        let content = TWO_QUADS.replacen("# 6", "#6", 1);
        let_assert!(Ok(model) = PatchModel::parse(&content));
        assert!(model.patches().len() == 2);
    }

    #[test]
    fn empty_model() {
        let_assert!(Ok(model) = PatchModel::parse("# 0 0"));
        assert!(model.patches().is_empty());
        assert!(model.extents().height == 0.0);
    }

    #[test]
    fn missing_header() {
        let_assert!(Err(ModelOpenError::MissingHeader) = PatchModel::parse("6 8\nv 0 0 0"));
    }

    #[test]
    fn huge_index_count() {
        let_assert!(
            Err(ModelOpenError::UnexpectedEof(_)) = PatchModel::parse("# 0 4000000000000000000")
        );
    }

    #[test]
    fn index_count_not_multiple_of_four() {
        let_assert!(Err(ModelOpenError::IndexCount(6)) = PatchModel::parse("# 0 6"));
    }

    #[test_case("6/6/6 5/5/5", "6/6/6 7/7/7" ; "past_the_end")]
    #[test_case("f 2/2/2", "f 0/2/2" ; "zero")]
    fn face_index_out_of_range(from: &str, to: &str) {
        let content = TWO_QUADS.replacen(from, to, 1);
        let_assert!(Err(ModelOpenError::IndexOutOfRange { vertex_count: 6, .. }) = PatchModel::parse(&content));
    }

    #[test]
    fn truncated() {
        let content = &TWO_QUADS[..TWO_QUADS.find("vt").unwrap()];
        let_assert!(Err(ModelOpenError::UnexpectedEof("vt")) = PatchModel::parse(content));
    }

    #[test]
    fn unexpected_tag() {
        let content = TWO_QUADS.replacen("vn", "vx", 1);
        let_assert!(Err(ModelOpenError::UnexpectedToken { expected: "vn", found }) = PatchModel::parse(&content));
        assert!(found == "vx");
    }

    #[test]
    fn bad_number() {
        let content = TWO_QUADS.replacen("v 1 0 0", "v 1 zero 0", 1);
        let_assert!(Err(ModelOpenError::ParseError { what: "vertex", token }) = PatchModel::parse(&content));
        assert!(token == "zero");
    }

    #[test]
    fn missing_file() {
        let_assert!(
            Err(ModelOpenError::ReadError(_)) =
                PatchModel::with_file("this/file/does/not/exist.model")
        );
    }

    #[test]
    fn transform_moves_patches_and_extents() {
        let_assert!(Ok(mut model) = PatchModel::parse(TWO_QUADS));
        model.transform(2.0, &WorldVector::new(1.0, 2.0, 3.0));

        assert!(model.patches()[0][1] == WorldPoint::new(1.0, 2.0, 3.0));
        assert!(model.patches()[1][3] == WorldPoint::new(5.0, 2.0, 3.0));

        let extents = model.extents();
        assert!(extents.center == WorldPoint::new(1.0, 2.0, 3.0));
        assert!(extents.radius == 4.0);
        assert!(extents.height == 2.0);
    }

    #[test]
    fn build_bvh_single_leaf() {
        let_assert!(Ok(mut model) = PatchModel::parse(TWO_QUADS));
        let bvh = model.build_bvh(
            &BvhSettings::builder()
                .leaf_threshold(DEFAULT_LEAF_THRESHOLD)
                .build(),
        );
        assert!(bvh.len() == 1);
        assert!(bvh.validate(model.patches().len()) == Ok(()));
        assert!(model.gpu_patches().len() == 2);
        assert!(model.gpu_patches()[0].points[1] == [0.0, 0.0, 0.0]);
    }
}
