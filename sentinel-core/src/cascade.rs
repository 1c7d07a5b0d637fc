//! Boosted Haar cascade evaluation.
//!
//! Reads the stock XML cascade files (`opencv_storage/cascade`, `BOOST` stages over
//! `HAAR` features) and scans a grayscale image at multiple scales. Raw window hits are
//! merged with the same neighbour-grouping rule the cascade files were tuned against,
//! so `min_neighbors` keeps its usual meaning.

use std::{borrow::Cow, fs, path::Path};

use anyhow::{Context, Result};
use image::GrayImage;
use log::debug;
use rayon::prelude::*;
use roxmltree::{Document, Node};
use sentinel_utils::{config::DetectionSettings, resize_bilinear, timing_guard};

use crate::detector::FaceRegion;

/// Similarity tolerance used when merging neighbouring hits.
pub const GROUP_EPS: f64 = 0.2;

/// Multi-scale scan parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    /// Growth factor between successive window sizes; must be > 1.
    pub scale_factor: f64,
    /// Raw hits a cluster needs (strictly more than this) to be reported.
    /// Zero disables grouping and returns every raw hit.
    pub min_neighbors: u32,
    /// Smallest window side in pixels.
    pub min_size: u32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
        }
    }
}

impl From<&DetectionSettings> for CascadeParams {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            scale_factor: settings.scale_factor,
            min_neighbors: settings.min_neighbors,
            min_size: settings.min_size,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f64,
}

#[derive(Debug, Clone)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
}

impl HaarFeature {
    fn raw_value(&self, integral: &IntegralImage, x: u32, y: u32) -> f64 {
        self.rects
            .iter()
            .map(|r| r.weight * integral.sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct WeakTree {
    nodes: Vec<TreeNode>,
    leaves: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Stage {
    threshold: f64,
    trees: Vec<WeakTree>,
}

/// A loaded boosted Haar cascade.
#[derive(Debug, Clone)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Load a cascade XML file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        anyhow::ensure!(path.exists(), "cascade file not found: {}", path.display());
        let xml = fs::read_to_string(path)
            .with_context(|| format!("failed to read cascade {}", path.display()))?;
        let cascade = Self::from_xml_str(&xml)
            .with_context(|| format!("failed to load cascade {}", path.display()))?;
        debug!(
            "Loaded cascade {} ({} stages, {} features, {}x{} window)",
            path.display(),
            cascade.stages.len(),
            cascade.features.len(),
            cascade.window.0,
            cascade.window.1
        );
        Ok(cascade)
    }

    /// Parse cascade XML held in memory.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).context("cascade is not well-formed XML")?;
        let root = doc
            .descendants()
            .find(|n| n.has_tag_name("cascade"))
            .context("missing <cascade> element")?;

        let stage_type = child_text(root, "stageType")?;
        anyhow::ensure!(
            stage_type == "BOOST",
            "unsupported stage type '{stage_type}' (only BOOST)"
        );
        let feature_type = child_text(root, "featureType")?;
        anyhow::ensure!(
            feature_type == "HAAR",
            "unsupported feature type '{feature_type}' (only HAAR)"
        );

        let width: u32 = parse_token(child_text(root, "width")?, "width")?;
        let height: u32 = parse_token(child_text(root, "height")?, "height")?;
        anyhow::ensure!(
            width >= 3 && height >= 3,
            "cascade window {width}x{height} is too small"
        );

        let features = elements(child(root, "features")?)
            .enumerate()
            .map(|(idx, node)| parse_feature(node).with_context(|| format!("feature #{idx}")))
            .collect::<Result<Vec<_>>>()?;
        for (idx, feature) in features.iter().enumerate() {
            for r in &feature.rects {
                anyhow::ensure!(
                    r.x + r.width <= width && r.y + r.height <= height,
                    "feature #{idx} extends outside the {width}x{height} window"
                );
            }
        }

        let stages = elements(child(root, "stages")?)
            .enumerate()
            .map(|(idx, node)| {
                parse_stage(node, features.len()).with_context(|| format!("stage #{idx}"))
            })
            .collect::<Result<Vec<_>>>()?;
        anyhow::ensure!(!stages.is_empty(), "cascade has no stages");

        Ok(Self {
            window: (width, height),
            stages,
            features,
        })
    }

    /// Base detection window (width, height).
    pub fn window_size(&self) -> (u32, u32) {
        self.window
    }

    /// Number of boosted stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Detect objects, grouping raw hits unless `min_neighbors` is zero.
    ///
    /// Regions are returned in a deterministic order for a given image.
    pub fn detect_multi_scale(&self, gray: &GrayImage, params: &CascadeParams) -> Vec<FaceRegion> {
        let _guard = timing_guard("sentinel_core::cascade::detect_multi_scale", log::Level::Debug);
        let hits = self.scan(gray, params);
        debug!("cascade produced {} raw window hit(s)", hits.len());
        group_rectangles(&hits, params.min_neighbors, GROUP_EPS)
    }

    /// Every window accepted by all stages, across all scales.
    pub fn scan(&self, gray: &GrayImage, params: &CascadeParams) -> Vec<FaceRegion> {
        let scales = self.scan_scales(gray.dimensions(), params);
        scales
            .par_iter()
            .map(|scale| self.scan_scale(gray, scale))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn scan_scales(&self, (width, height): (u32, u32), params: &CascadeParams) -> Vec<ScanScale> {
        let mut scales = Vec::new();
        if !(params.scale_factor > 1.0) {
            return scales;
        }
        let (win_w, win_h) = self.window;
        let mut factor = 1.0f64;
        loop {
            let window = (
                (f64::from(win_w) * factor).round() as u32,
                (f64::from(win_h) * factor).round() as u32,
            );
            let scaled = (
                (f64::from(width) / factor).round() as u32,
                (f64::from(height) / factor).round() as u32,
            );
            if scaled.0 <= win_w || scaled.1 <= win_h {
                break;
            }
            if window.0 >= params.min_size && window.1 >= params.min_size {
                scales.push(ScanScale {
                    factor,
                    window,
                    scaled,
                });
            }
            factor *= params.scale_factor;
        }
        scales
    }

    fn scan_scale(&self, gray: &GrayImage, scale: &ScanScale) -> Vec<FaceRegion> {
        let image: Cow<'_, GrayImage> = if scale.scaled == gray.dimensions() {
            Cow::Borrowed(gray)
        } else {
            Cow::Owned(resize_bilinear(gray, scale.scaled.0, scale.scaled.1))
        };
        let integral = IntegralImage::new(&image);
        let step = if scale.factor > 2.0 { 1 } else { 2 };
        let span_x = scale.scaled.0 - self.window.0;
        let span_y = scale.scaled.1 - self.window.1;

        let mut hits = Vec::new();
        for y in (0..span_y).step_by(step as usize) {
            let mut x = 0;
            while x < span_x {
                match self.classify_window(&integral, x, y) {
                    Ok(()) => hits.push(FaceRegion {
                        x: (f64::from(x) * scale.factor).round() as u32,
                        y: (f64::from(y) * scale.factor).round() as u32,
                        width: scale.window.0,
                        height: scale.window.1,
                    }),
                    // Rejected by the very first stage: the neighbour is unlikely too.
                    Err(0) => x += step,
                    Err(_) => {}
                }
                x += step;
            }
        }
        hits
    }

    /// Run every stage on the window anchored at (x, y).
    ///
    /// Returns the index of the rejecting stage on failure.
    fn classify_window(&self, integral: &IntegralImage, x: u32, y: u32) -> Result<(), usize> {
        let (win_w, win_h) = self.window;
        let (nx, ny, nw, nh) = (x + 1, y + 1, win_w - 2, win_h - 2);
        let area = f64::from(nw) * f64::from(nh);
        let sum = integral.sum(nx, ny, nw, nh) as f64;
        let sq_sum = integral.sq_sum(nx, ny, nw, nh) as f64;
        let norm = area * sq_sum - sum * sum;
        let inv_norm = if norm > 0.0 { 1.0 / norm.sqrt() } else { 1.0 };

        for (stage_idx, stage) in self.stages.iter().enumerate() {
            let mut total = 0.0f64;
            for tree in &stage.trees {
                let mut node_idx = 0usize;
                loop {
                    let node = &tree.nodes[node_idx];
                    let value = self.features[node.feature].raw_value(integral, x, y) * inv_norm;
                    let next = if value < node.threshold {
                        node.left
                    } else {
                        node.right
                    };
                    if next <= 0 {
                        total += tree.leaves[next.unsigned_abs() as usize];
                        break;
                    }
                    node_idx = next as usize;
                }
            }
            if total < stage.threshold {
                return Err(stage_idx);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ScanScale {
    factor: f64,
    window: (u32, u32),
    scaled: (u32, u32),
}

/// Summed-area tables of pixel values and squared pixel values.
pub struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0u64; stride * (height as usize + 1)];
        let mut sq_sum = vec![0u64; sum.len()];
        let raw = image.as_raw();

        for y in 0..height as usize {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width as usize {
                let value = u64::from(raw[y * width as usize + x]);
                row += value;
                row_sq += value * value;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    /// Sum of pixels inside the rectangle.
    pub fn sum(&self, x: u32, y: u32, width: u32, height: u32) -> u64 {
        self.rect(&self.sum, x, y, width, height)
    }

    /// Sum of squared pixels inside the rectangle.
    pub fn sq_sum(&self, x: u32, y: u32, width: u32, height: u32) -> u64 {
        self.rect(&self.sq_sum, x, y, width, height)
    }

    fn rect(&self, table: &[u64], x: u32, y: u32, width: u32, height: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + width as usize, y0 + height as usize);
        let top_left = table[y0 * self.stride + x0];
        let top_right = table[y0 * self.stride + x1];
        let bottom_left = table[y1 * self.stride + x0];
        let bottom_right = table[y1 * self.stride + x1];
        (bottom_right + top_left) - (top_right + bottom_left)
    }
}

/// Merge overlapping window hits into detections.
///
/// Hits are clustered by similarity (`eps`), each cluster is averaged, clusters with
/// `group_threshold` or fewer members are dropped, and clusters lying inside a
/// stronger cluster are suppressed. `group_threshold == 0` returns the input unchanged.
pub fn group_rectangles(rects: &[FaceRegion], group_threshold: u32, eps: f64) -> Vec<FaceRegion> {
    if group_threshold == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, class_count) = partition(rects, |a, b| similar(a, b, eps));

    let mut sums = vec![[0i64; 4]; class_count];
    let mut weights = vec![0u32; class_count];
    for (rect, &label) in rects.iter().zip(&labels) {
        let acc = &mut sums[label];
        acc[0] += i64::from(rect.x);
        acc[1] += i64::from(rect.y);
        acc[2] += i64::from(rect.width);
        acc[3] += i64::from(rect.height);
        weights[label] += 1;
    }

    let averaged: Vec<FaceRegion> = sums
        .iter()
        .zip(&weights)
        .map(|(acc, &count)| {
            let scale = 1.0 / f64::from(count);
            let avg = |v: i64| (v as f64 * scale).round() as u32;
            FaceRegion {
                x: avg(acc[0]),
                y: avg(acc[1]),
                width: avg(acc[2]),
                height: avg(acc[3]),
            }
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = weights[i];
        if n1 <= group_threshold {
            continue;
        }
        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = weights[j];
            if j == i || n2 <= group_threshold {
                return false;
            }
            let dx = (f64::from(r2.width) * eps).round() as i64;
            let dy = (f64::from(r2.height) * eps).round() as i64;
            let (x1, y1, w1, h1) = r1.as_i64();
            let (x2, y2, w2, h2) = r2.as_i64();
            x1 >= x2 - dx
                && y1 >= y2 - dy
                && x1 + w1 <= x2 + w2 + dx
                && y1 + h1 <= y2 + h2 + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}

fn similar(a: &FaceRegion, b: &FaceRegion, eps: f64) -> bool {
    let (ax, ay, aw, ah) = a.as_i64();
    let (bx, by, bw, bh) = b.as_i64();
    let delta = eps * (aw.min(bw) + ah.min(bh)) as f64 * 0.5;
    let close = |d: i64| (d.abs() as f64) <= delta;
    close(ax - bx) && close(ay - by) && close(ax + aw - bx - bw) && close(ay + ah - by - bh)
}

/// Union-find equivalence classes; labels follow first appearance order.
fn partition<T>(items: &[T], same: impl Fn(&T, &T) -> bool) -> (Vec<usize>, usize) {
    fn find(parent: &mut [usize], mut idx: usize) -> usize {
        while parent[idx] != idx {
            parent[idx] = parent[parent[idx]];
            idx = parent[idx];
        }
        idx
    }

    let mut parent: Vec<usize> = (0..items.len()).collect();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if same(&items[i], &items[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut root_labels = vec![usize::MAX; items.len()];
    let mut labels = Vec::with_capacity(items.len());
    let mut count = 0;
    for i in 0..items.len() {
        let root = find(&mut parent, i);
        if root_labels[root] == usize::MAX {
            root_labels[root] = count;
            count += 1;
        }
        labels.push(root_labels[root]);
    }
    (labels, count)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .with_context(|| format!("missing <{name}> element"))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    Ok(child(node, name)?.text().unwrap_or_default().trim())
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn parse_token<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid {what} value '{token}'"))
}

fn parse_numbers(text: &str, what: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|token| parse_token(token, what))
        .collect()
}

fn parse_feature(node: Node<'_, '_>) -> Result<HaarFeature> {
    if let Ok(tilted) = child_text(node, "tilted") {
        anyhow::ensure!(
            tilted == "0",
            "tilted Haar features are not supported"
        );
    }
    let rects = elements(child(node, "rects")?)
        .map(|rect| {
            let text = rect.text().unwrap_or_default();
            let tokens: Vec<&str> = text.split_whitespace().collect();
            anyhow::ensure!(
                tokens.len() == 5,
                "rectangle needs 5 values, got {}",
                tokens.len()
            );
            Ok(WeightedRect {
                x: parse_token(tokens[0], "rect x")?,
                y: parse_token(tokens[1], "rect y")?,
                width: parse_token(tokens[2], "rect width")?,
                height: parse_token(tokens[3], "rect height")?,
                weight: parse_token(tokens[4], "rect weight")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!rects.is_empty(), "feature has no rectangles");
    Ok(HaarFeature { rects })
}

fn parse_stage(node: Node<'_, '_>, feature_count: usize) -> Result<Stage> {
    let threshold = parse_token(child_text(node, "stageThreshold")?, "stage threshold")?;
    let trees = elements(child(node, "weakClassifiers")?)
        .map(|weak| parse_tree(weak, feature_count))
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!trees.is_empty(), "stage has no weak classifiers");
    Ok(Stage { threshold, trees })
}

fn parse_tree(node: Node<'_, '_>, feature_count: usize) -> Result<WeakTree> {
    let raw_nodes = parse_numbers(child_text(node, "internalNodes")?, "internal node")?;
    let leaves = parse_numbers(child_text(node, "leafValues")?, "leaf value")?;
    anyhow::ensure!(
        !raw_nodes.is_empty() && raw_nodes.len() % 4 == 0,
        "internalNodes must hold groups of 4 values, got {}",
        raw_nodes.len()
    );

    let nodes: Vec<TreeNode> = raw_nodes
        .chunks_exact(4)
        .map(|chunk| TreeNode {
            left: chunk[0] as i32,
            right: chunk[1] as i32,
            feature: chunk[2] as usize,
            threshold: chunk[3],
        })
        .collect();

    for (node_idx, node) in nodes.iter().enumerate() {
        anyhow::ensure!(
            node.feature < feature_count,
            "feature index {} out of range ({} features)",
            node.feature,
            feature_count
        );
        for next in [node.left, node.right] {
            let in_range = if next <= 0 {
                (next.unsigned_abs() as usize) < leaves.len()
            } else {
                (next as usize) < nodes.len()
            };
            anyhow::ensure!(in_range, "tree branch {next} points outside the tree");
            // Nodes are stored in evaluation order; a backward branch would never terminate.
            anyhow::ensure!(
                next <= 0 || next as usize > node_idx,
                "tree node {node_idx} branches back to node {next}"
            );
        }
    }
    Ok(WeakTree { nodes, leaves })
}
