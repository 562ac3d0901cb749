//! Lloyd's k-means over per-pixel color vectors.
//!
//! Every iteration is a fork-join: the object array is split into one
//! contiguous chunk per worker, each worker assigns its chunk to the nearest
//! centroid and reports the members it found, and the controller merges the
//! reports and recomputes the centroids once every worker has joined.

use crate::error::{ProcessError, Result};
use crate::vector::{ColorVector, PositionedVector};
use image::RgbaImage;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::ops::Range;
use std::thread;
use std::time::Instant;

pub const MAX_ITERATIONS: usize = 100;

/// What to do with a centroid whose cluster received no members.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyClusterPolicy {
    /// Leave the centroid where it was.
    #[default]
    KeepPrevious,
    /// Move the centroid onto a randomly drawn object.
    Reseed,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub num_threads: usize,
    pub empty_cluster: EmptyClusterPolicy,
    pub seed: Option<u64>,
}

pub fn default_config(k: usize) -> ClusterConfig {
    ClusterConfig {
        k,
        max_iterations: MAX_ITERATIONS,
        num_threads: num_cpus::get().max(1),
        empty_cluster: EmptyClusterPolicy::default(),
        seed: None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cluster {
    pub centroid: ColorVector,
    pub members: Vec<PositionedVector>,
}

impl Cluster {
    pub fn new(centroid: ColorVector) -> Self { Self { centroid, members: Vec::new() } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// An iteration finished without any object changing cluster.
    Converged { iterations: usize },
    /// Objects were still moving when the iteration cap was hit.
    IterationCap { iterations: usize },
}

impl Termination {
    pub fn iterations(self) -> usize {
        match self {
            Self::Converged { iterations } | Self::IterationCap { iterations } => iterations,
        }
    }

    pub fn converged(self) -> bool { matches!(self, Self::Converged { .. }) }
}

/// One [`PositionedVector`] per pixel, row-major, so pixel `(x, y)` lives at
/// index `y * width + x`.
pub fn build_objects(img: &RgbaImage) -> Vec<PositionedVector> {
    img.enumerate_pixels()
        .map(|(x, y, p)| PositionedVector::new(ColorVector::from_rgb(p[0], p[1], p[2]), x, y))
        .collect()
}

/// Contiguous per-worker ranges covering `0..len` exactly once. Every worker
/// but the last gets `len / workers` objects; the last one takes the rest.
pub fn chunk_bounds(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, len.max(1));
    let chunk = len / workers;
    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i == workers - 1 { len } else { (i + 1) * chunk };
            start..end
        })
        .collect()
}

/// Index of the closest centroid by squared distance. Ties go to the lowest
/// index.
pub fn nearest_centroid(v: ColorVector, centroids: &[ColorVector]) -> usize {
    let mut found = false;
    let mut best = 0;
    let mut best_d = 0.0;
    for (i, c) in centroids.iter().enumerate() {
        let d = v.squared_distance(*c);
        if !found || d < best_d {
            found = true;
            best = i;
            best_d = d;
        }
    }
    best
}

struct WorkerReport {
    members: Vec<Vec<PositionedVector>>,
    changed: bool,
}

fn scan_section(section: &mut [PositionedVector], centroids: &[ColorVector]) -> WorkerReport {
    let mut changed = false;
    let mut members = vec![Vec::new(); centroids.len()];

    for o in section.iter_mut() {
        let closest = nearest_centroid(o.vector, centroids);
        if o.cluster != Some(closest) {
            changed = true;
            o.cluster = Some(closest);
        }
        members[closest].push(*o);
    }

    WorkerReport { members, changed }
}

/// Assignment and reduction: clear every cluster, assign every object to its
/// nearest centroid on `workers` threads, and merge the partial member lists.
/// Returns whether any object changed cluster.
///
/// Centroids are only read while workers run; each worker writes to its own
/// chunk of `objects`.
pub fn assign(objects: &mut [PositionedVector], clusters: &mut [Cluster], workers: usize) -> Result<bool> {
    for c in clusters.iter_mut() {
        c.members.clear();
    }
    if objects.is_empty() {
        return Ok(false);
    }

    let centroids: Vec<ColorVector> = clusters.iter().map(|c| c.centroid).collect();
    let bounds = chunk_bounds(objects.len(), workers);

    let reports = thread::scope(|s| {
        let mut handles = Vec::with_capacity(bounds.len());
        let mut rest: &mut [PositionedVector] = objects;
        for r in &bounds {
            let (section, tail) = std::mem::take(&mut rest).split_at_mut(r.len());
            rest = tail;
            let centroids = &centroids;
            handles.push(s.spawn(move || scan_section(section, centroids)));
        }
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| ProcessError::WorkerPanicked))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut changed = false;
    for report in reports {
        for (cluster, members) in clusters.iter_mut().zip(report.members) {
            cluster.members.extend(members);
        }
        changed |= report.changed;
    }
    Ok(changed)
}

/// Recompute each centroid as the mean of its members. Empty clusters are
/// handled by `policy`; returns how many were empty.
pub fn update_centroids(
    clusters: &mut [Cluster],
    policy: EmptyClusterPolicy,
    objects: &[PositionedVector],
    rng: &mut impl Rng,
) -> usize {
    let mut empty = 0;
    for (i, c) in clusters.iter_mut().enumerate() {
        if c.members.is_empty() {
            empty += 1;
            match policy {
                EmptyClusterPolicy::KeepPrevious => debug!("cluster {} is empty, keeping its centroid", i),
                EmptyClusterPolicy::Reseed if !objects.is_empty() => {
                    let o = rng.gen_range(0..objects.len());
                    debug!("cluster {} is empty, reseeding from object {}", i, o);
                    c.centroid = objects[o].vector;
                }
                EmptyClusterPolicy::Reseed => {}
            }
            continue;
        }
        let sum = c.members.iter().fold(ColorVector::default(), |acc, m| acc.add(m.vector));
        c.centroid = sum.scale(1.0 / c.members.len() as f64);
    }
    empty
}

/// A single clustering run over one image.
pub struct KMeans {
    width: u32,
    height: u32,
    objects: Vec<PositionedVector>,
    clusters: Vec<Cluster>,
    config: ClusterConfig,
    rng: Xoshiro256PlusPlus,
}

impl KMeans {
    /// Objects and rng for `img`, with no clusters yet.
    fn prepare(img: &RgbaImage, config: ClusterConfig) -> Result<Self> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ProcessError::EmptyImage { width, height });
        }
        let objects = build_objects(img);
        validate_k(config.k, objects.len())?;

        let seed = config.seed.unwrap_or_else(rand::random);
        debug!("k-means seed {}", seed);
        let rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        Ok(Self { width, height, objects, clusters: Vec::new(), config, rng })
    }

    /// Build the objects for `img` and seed `config.k` centroids from
    /// uniformly drawn objects (with replacement).
    pub fn new(img: &RgbaImage, config: ClusterConfig) -> Result<Self> {
        let mut km = Self::prepare(img, config)?;
        let n = km.objects.len();
        let clusters = (0..km.config.k)
            .map(|_| Cluster::new(km.objects[km.rng.gen_range(0..n)].vector))
            .collect();
        km.clusters = clusters;
        Ok(km)
    }

    /// Like [`KMeans::new`] but starting from the given centroids; `config.k`
    /// is taken from their count. No random draws happen here, so the rng
    /// is left exactly as seeded.
    pub fn with_centroids(img: &RgbaImage, centroids: &[ColorVector], mut config: ClusterConfig) -> Result<Self> {
        config.k = centroids.len();
        let mut km = Self::prepare(img, config)?;
        km.clusters = centroids.iter().copied().map(Cluster::new).collect();
        Ok(km)
    }

    pub fn clusters(&self) -> &[Cluster] { &self.clusters }
    pub fn objects(&self) -> &[PositionedVector] { &self.objects }

    /// One Lloyd iteration. Returns whether any object changed cluster.
    pub fn step(&mut self) -> Result<bool> {
        let changed = assign(&mut self.objects, &mut self.clusters, self.config.num_threads)?;
        update_centroids(&mut self.clusters, self.config.empty_cluster, &self.objects, &mut self.rng);
        Ok(changed)
    }

    /// Iterate until nothing changes or the iteration cap is reached.
    pub fn run(mut self) -> Result<Clustering> {
        let t = Instant::now();
        let cap = self.config.max_iterations.max(1);
        info!(
            "k-means: {} objects, k={}, {} workers",
            self.objects.len(),
            self.config.k,
            self.config.num_threads.clamp(1, self.objects.len())
        );

        let mut iterations = 0;
        let termination = loop {
            let changed = self.step()?;
            iterations += 1;
            if !changed {
                info!("k-means solved after {} iterations", iterations);
                break Termination::Converged { iterations };
            }
            if iterations >= cap {
                warn!("k-means reached max {} iterations", iterations);
                break Termination::IterationCap { iterations };
            }
        };
        info!("k-means completed in {:?}", t.elapsed());

        Ok(Clustering {
            width: self.width,
            height: self.height,
            objects: self.objects,
            clusters: self.clusters,
            termination,
        })
    }
}

fn validate_k(k: usize, pixels: usize) -> Result<()> {
    if k == 0 || k > pixels {
        return Err(ProcessError::InvalidClusterCount { k, pixels });
    }
    Ok(())
}

/// Cluster the colors of `img`.
pub fn cluster_image(img: &RgbaImage, config: ClusterConfig) -> Result<Clustering> {
    KMeans::new(img, config)?.run()
}

/// The outcome of a finished clustering run.
#[derive(Debug, Clone)]
pub struct Clustering {
    width: u32,
    height: u32,
    objects: Vec<PositionedVector>,
    clusters: Vec<Cluster>,
    termination: Termination,
}

impl Clustering {
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn termination(&self) -> Termination { self.termination }
    pub fn objects(&self) -> &[PositionedVector] { &self.objects }
    pub fn clusters(&self) -> &[Cluster] { &self.clusters }

    pub fn centroids(&self) -> Vec<ColorVector> { self.clusters.iter().map(|c| c.centroid).collect() }
    pub fn cluster_sizes(&self) -> Vec<usize> { self.clusters.iter().map(|c| c.members.len()).collect() }

    /// Cluster id of pixel `(x, y)`.
    pub fn cluster_at(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.objects[y as usize * self.width as usize + x as usize].cluster
    }

    /// A new image with every pixel painted in its cluster's centroid color.
    pub fn paint(&self) -> RgbaImage {
        let colors: Vec<[u8; 3]> = self.clusters.iter().map(|c| c.centroid.to_rgb()).collect();
        let mut meaned = RgbaImage::new(self.width, self.height);
        for (o, px) in self.objects.iter().zip(meaned.pixels_mut()) {
            if let Some(c) = o.cluster {
                let [r, g, b] = colors[c];
                px.0 = [r, g, b, 255];
            }
        }
        meaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    fn config(k: usize, threads: usize) -> ClusterConfig {
        ClusterConfig { num_threads: threads, seed: Some(7), ..default_config(k) }
    }

    fn stripes(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| match x % 3 {
            0 => Rgba([250, 10, 10, 255]),
            1 => Rgba([10, 250, 10, 255]),
            _ => Rgba([10, 10, 250, 255]),
        })
    }

    #[test]
    fn chunks_cover_every_index_once() {
        for len in [1usize, 2, 7, 10, 11, 64, 1001] {
            for workers in [1usize, 2, 3, 4, 8, 16, 2000] {
                let bounds = chunk_bounds(len, workers);
                let mut seen = vec![0u32; len];
                for r in &bounds {
                    for i in r.clone() {
                        seen[i] += 1;
                    }
                }
                assert!(seen.iter().all(|&n| n == 1), "len={len} workers={workers}");
                assert!(bounds.windows(2).all(|w| w[0].end == w[1].start));
            }
        }
    }

    #[test]
    fn chunk_sizes_follow_floor_split() {
        let bounds = chunk_bounds(10, 3);
        assert_eq!(bounds, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn zero_distance_to_a_later_centroid_wins() {
        let v = ColorVector::new(0.5, 0.5, 0.5);
        let centroids = [ColorVector::new(0.0, 0.0, 0.0), v];
        assert_eq!(nearest_centroid(v, &centroids), 1);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let v = ColorVector::new(0.5, 0.5, 0.5);
        let c = ColorVector::new(0.25, 0.5, 0.5);
        assert_eq!(nearest_centroid(v, &[ColorVector::new(1.0, 1.0, 1.0), c, c]), 1);
    }

    #[test]
    fn assignment_partitions_all_objects() {
        let img = stripes(13, 7);
        for threads in [1, 2, 3, 5, 8] {
            let mut km = KMeans::new(&img, config(4, threads)).unwrap();
            km.step().unwrap();
            let total: usize = km.clusters().iter().map(|c| c.members.len()).sum();
            assert_eq!(total, km.objects().len());
            for (i, c) in km.clusters().iter().enumerate() {
                assert!(c.members.iter().all(|m| m.cluster == Some(i)));
            }
            assert!(km.objects().iter().all(|o| o.cluster.is_some_and(|c| c < 4)));
        }
    }

    #[test]
    fn centroid_is_member_mean() {
        let members = [(0.2, 0.4, 0.6), (0.4, 0.0, 1.0), (0.0, 0.2, 0.2)]
            .into_iter()
            .map(|(r, g, b)| PositionedVector::new(ColorVector::new(r, g, b), 0, 0))
            .collect();
        let mut clusters = vec![Cluster { centroid: ColorVector::default(), members }];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let empty = update_centroids(&mut clusters, EmptyClusterPolicy::KeepPrevious, &[], &mut rng);
        assert_eq!(empty, 0);
        let c = clusters[0].centroid;
        assert!((c.r - 0.2).abs() < 1e-12);
        assert!((c.g - 0.2).abs() < 1e-12);
        assert!((c.b - 0.6).abs() < 1e-12);
    }

    #[test]
    fn empty_cluster_keeps_its_centroid() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        let far = ColorVector::new(1.0, 1.0, 1.0);
        let mut km = KMeans::with_centroids(&img, &[ColorVector::default(), far], config(2, 2)).unwrap();
        km.step().unwrap();
        assert!(km.clusters()[1].members.is_empty());
        assert_eq!(km.clusters()[1].centroid, far);
        assert!(!km.clusters()[0].centroid.r.is_nan());
    }

    #[test]
    fn empty_cluster_can_be_reseeded() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        let far = ColorVector::new(1.0, 1.0, 1.0);
        let cfg = ClusterConfig { empty_cluster: EmptyClusterPolicy::Reseed, ..config(2, 2) };
        let mut km = KMeans::with_centroids(&img, &[ColorVector::default(), far], cfg).unwrap();
        km.step().unwrap();
        // every object is black, so any reseed lands on black
        assert_eq!(km.clusters()[1].centroid, ColorVector::default());
    }

    #[test]
    fn given_centroids_leave_the_rng_untouched() {
        let img = stripes(6, 2);
        let cfg = config(2, 1);
        let mut km = KMeans::with_centroids(&img, &[ColorVector::default(), ColorVector::new(1.0, 1.0, 1.0)], cfg)
            .unwrap();
        let mut fresh = Xoshiro256PlusPlus::seed_from_u64(7);
        let drawn: Vec<u64> = (0..4).map(|_| km.rng.gen()).collect();
        let expected: Vec<u64> = (0..4).map(|_| fresh.gen()).collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn given_centroids_still_validate_k() {
        let img = stripes(1, 1);
        let two = [ColorVector::default(), ColorVector::new(1.0, 1.0, 1.0)];
        assert!(matches!(
            KMeans::with_centroids(&img, &two, config(2, 1)),
            Err(ProcessError::InvalidClusterCount { k: 2, pixels: 1 })
        ));
        assert!(matches!(
            KMeans::with_centroids(&img, &[], config(1, 1)),
            Err(ProcessError::InvalidClusterCount { k: 0, pixels: 1 })
        ));
    }

    #[test]
    fn diagonal_pairs_split_into_black_and_white() {
        let img = RgbaImage::from_raw(
            2,
            2,
            vec![0, 0, 0, 255, 255, 255, 255, 255, 255, 255, 255, 255, 0, 0, 0, 255],
        )
        .unwrap();
        let white = ColorVector::new(1.0, 1.0, 1.0);
        let km = KMeans::with_centroids(&img, &[ColorVector::default(), white], config(2, 4)).unwrap();
        let result = km.run().unwrap();

        assert!(result.termination().converged());
        assert!(result.termination().iterations() <= 2);
        let mut colors: Vec<[u8; 3]> = result.centroids().iter().map(|c| c.to_rgb()).collect();
        colors.sort();
        assert_eq!(colors, vec![[0, 0, 0], [255, 255, 255]]);
        assert_eq!(result.cluster_at(0, 0), result.cluster_at(1, 1));
        assert_eq!(result.cluster_at(1, 0), result.cluster_at(0, 1));
        assert_ne!(result.cluster_at(0, 0), result.cluster_at(1, 0));
        assert_eq!(result.cluster_sizes(), vec![2, 2]);
    }

    #[test]
    fn converged_run_does_not_change_on_the_next_step() {
        let img = stripes(9, 4);
        let mut km = KMeans::new(&img, config(3, 3)).unwrap();
        let mut iterations = 0;
        while km.step().unwrap() {
            iterations += 1;
            assert!(iterations < MAX_ITERATIONS);
        }
        assert!(!km.step().unwrap());
    }

    #[test]
    fn iteration_cap_is_reported() {
        let img = stripes(9, 4);
        let cfg = ClusterConfig { max_iterations: 1, ..config(3, 2) };
        let result = cluster_image(&img, cfg).unwrap();
        // the first step always moves objects out of the unassigned state
        assert_eq!(result.termination(), Termination::IterationCap { iterations: 1 });
    }

    #[test]
    fn paint_uses_centroid_colors_and_full_alpha() {
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 { Rgba([255, 0, 0, 10]) } else { Rgba([0, 0, 255, 10]) }
        });
        let red = ColorVector::from_rgb(255, 0, 0);
        let blue = ColorVector::from_rgb(0, 0, 255);
        let result = KMeans::with_centroids(&img, &[red, blue], config(2, 2)).unwrap().run().unwrap();
        let out = result.paint();
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(0, 1).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(3, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn more_workers_than_pixels() {
        let img = stripes(2, 1);
        let result = cluster_image(&img, config(2, 64)).unwrap();
        assert_eq!(result.cluster_sizes().iter().sum::<usize>(), 2);
    }

    #[test]
    fn rejects_invalid_k() {
        let img = stripes(2, 2);
        assert!(matches!(
            KMeans::new(&img, config(0, 1)),
            Err(ProcessError::InvalidClusterCount { k: 0, pixels: 4 })
        ));
        assert!(matches!(
            KMeans::new(&img, config(5, 1)),
            Err(ProcessError::InvalidClusterCount { k: 5, pixels: 4 })
        ));
    }

    #[test]
    fn same_seed_same_result() {
        let img = RgbaImage::from_fn(12, 12, |x, y| Rgba([(x * 20) as u8, (y * 20) as u8, 90, 255]));
        let a = cluster_image(&img, config(5, 3)).unwrap();
        let b = cluster_image(&img, config(5, 1)).unwrap();
        assert_eq!(a.centroids(), b.centroids());
        assert_eq!(a.paint(), b.paint());
    }
}
