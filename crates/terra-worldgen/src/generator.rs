//! The map generation pipeline (component B): elevation -> connectivity
//! repair -> rivers -> moisture -> temperature -> biome -> resources ->
//! smoothing. Each phase is a method consuming the previous phase's grid.
//! Generation is pure and deterministic: same (width, height, seed, blobs,
//! config) always produces the same `Map`.

use crate::cell::{Biome, Cell, Feature, Map, Resource};
use terra_core::config::WorldConfig;
use terra_noise::{smooth_step, Noise2D, Rng};

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    InvalidDimensions,
    InvalidBlobCount,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::InvalidDimensions => write!(f, "width and height must be positive"),
            GenerationError::InvalidBlobCount => write!(f, "numBlobs must be at least 1"),
        }
    }
}
impl std::error::Error for GenerationError {}

struct Anchor {
    x: f32,
    y: f32,
    strength: f32,
    sigma: f32,
}

pub struct Generator {
    cfg: WorldConfig,
    width: u32,
    height: u32,
    seed: u32,
    num_blobs: usize,
    base: Noise2D,
    warp1: Noise2D,
    warp2: Noise2D,
    detail: Noise2D,
}

impl Generator {
    pub fn new(width: u32, height: u32, seed: u32, num_blobs: usize, cfg: WorldConfig) -> Result<Self, GenerationError> {
        if width == 0 || height == 0 {
            return Err(GenerationError::InvalidDimensions);
        }
        if num_blobs < 1 {
            return Err(GenerationError::InvalidBlobCount);
        }
        Ok(Self {
            cfg,
            width,
            height,
            seed,
            num_blobs,
            base: Noise2D::new(seed),
            warp1: Noise2D::new(seed.wrapping_add(1)),
            warp2: Noise2D::new(seed.wrapping_add(2)),
            detail: Noise2D::new(seed.wrapping_add(3)),
        })
    }

    pub fn generate(&self) -> Map {
        let anchors = self.place_anchors();
        let mut elevation = self.phase_elevation(&anchors);
        self.phase_connectivity_repair(&mut elevation);
        let (_flow, river_mask) = self.phase_rivers(&mut elevation);
        let moisture = self.phase_moisture(&elevation, &river_mask);
        let temperature = self.phase_temperature(&elevation);
        let mut map = self.assemble(elevation, moisture, temperature, river_mask);
        self.phase_biome(&mut map);
        self.phase_resources(&mut map);
        self.phase_smooth(&mut map);
        map
    }

    fn domain_warped_fbm(&self, x: f32, y: f32) -> f32 {
        let w1 = self.cfg.warp1_amplitude
            * self
                .warp1
                .sample(x * self.cfg.warp1_scale, y * self.cfg.warp1_scale)
                .unwrap_or(0.0);
        let w2 = self.cfg.warp2_amplitude
            * self
                .warp2
                .sample((x + w1) * self.cfg.warp2_scale, (y + w1) * self.cfg.warp2_scale)
                .unwrap_or(0.0);
        self.base.fbm(
            x + w1 + w2,
            y + w1 + w2,
            self.cfg.fbm_octaves,
            self.cfg.fbm_frequency,
            self.cfg.fbm_persistence,
        )
    }

    fn place_anchors(&self) -> Vec<Anchor> {
        let mut rng = Rng::new(self.seed ^ 0xA17C0DE);
        let w = self.width as f32;
        let h = self.height as f32;
        let margin = self.cfg.anchor_margin;
        let lo_x = margin * w;
        let hi_x = (1.0 - margin) * w;
        let lo_y = margin * h;
        let hi_y = (1.0 - margin) * h;

        (0..self.num_blobs)
            .map(|i| {
                let mut strength = self.cfg.anchor_min_strength + rng.next_f32() * self.cfg.anchor_strength_range;
                if i == 0 {
                    strength = strength.max(0.55);
                }
                Anchor {
                    x: rng.range(lo_x, hi_x),
                    y: rng.range(lo_y, hi_y),
                    strength,
                    sigma: self.cfg.anchor_min_sigma + rng.next_f32() * self.cfg.anchor_sigma_range,
                }
            })
            .collect()
    }

    fn anchor_bias(&self, x: f32, y: f32, anchors: &[Anchor]) -> f32 {
        anchors
            .iter()
            .map(|a| {
                let dx = x - a.x;
                let dy = y - a.y;
                let d2 = dx * dx + dy * dy;
                a.strength * (-d2 / (2.0 * a.sigma * a.sigma)).exp()
            })
            .fold(0.0f32, f32::max)
    }

    fn phase_elevation(&self, anchors: &[Anchor]) -> Vec<f32> {
        let w = self.width;
        let h = self.height;
        let mut elevation = vec![0.0f32; (w * h) as usize];

        for y in 0..h {
            for x in 0..w {
                let fx = x as f32;
                let fy = y as f32;
                let noise = self.domain_warped_fbm(fx, fy);
                let blob_bias = self.anchor_bias(fx, fy, anchors);

                let mut e = noise * self.cfg.noise_weight + blob_bias * self.cfg.anchor_weight + self.cfg.elevation_offset;

                if blob_bias > 0.2 && noise > 0.15 {
                    e += (blob_bias - 0.2) * noise * self.cfg.peak_amplify_strength;
                }

                let border = self.cfg.border_width * w as f32;
                let dist_x = fx.min(w as f32 - 1.0 - fx);
                let dist_y = fy.min(h as f32 - 1.0 - fy);
                let dist = dist_x.min(dist_y);
                let fade = smooth_step(0.0, border.max(1.0), dist);
                e *= fade;

                if e < self.cfg.sea_level {
                    e *= self.cfg.sub_sea_push;
                }

                elevation[(y * w + x) as usize] = e.clamp(0.0, 1.0);
            }
        }

        self.guarantee_peak(&mut elevation);
        elevation
    }

    fn guarantee_peak(&self, elevation: &mut [f32]) {
        let w = self.width;
        let h = self.height;
        let (argmax, max_val) = elevation
            .iter()
            .enumerate()
            .fold((0usize, f32::MIN), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });

        if max_val >= self.cfg.mountain_level + 0.03 {
            return;
        }

        let cx = (argmax as u32 % w) as f32;
        let cy = (argmax as u32 / w) as f32;
        let target = self.cfg.mountain_level + 0.07;
        let radius = (w.min(h) as f32) * 0.06;

        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                if d <= radius {
                    let t = 1.0 - (d / radius);
                    let idx = (y * w + x) as usize;
                    elevation[idx] = elevation[idx].max(lerp(elevation[idx], target, t)).clamp(0.0, 1.0);
                }
            }
        }
    }

    /// Labels 4-connected land components; if more than one exists, bridges
    /// every non-main component toward the largest via a handful of raised
    /// "blobs" interpolated along the path to the nearest main-component cell.
    fn phase_connectivity_repair(&self, elevation: &mut [f32]) {
        let w = self.width as i64;
        let h = self.height as i64;
        let sea = self.cfg.sea_level;
        let n = elevation.len();
        let mut labels = vec![-1i32; n];
        let mut components: Vec<Vec<usize>> = Vec::new();

        for start in 0..n {
            if labels[start] != -1 || elevation[start] < sea {
                continue;
            }
            let label = components.len() as i32;
            let mut stack = vec![start];
            let mut members = Vec::new();
            labels[start] = label;
            while let Some(i) = stack.pop() {
                members.push(i);
                let x = (i as i64) % w;
                let y = (i as i64) / w;
                for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let ni = (ny * w + nx) as usize;
                    if labels[ni] == -1 && elevation[ni] >= sea {
                        labels[ni] = label;
                        stack.push(ni);
                    }
                }
            }
            components.push(members);
        }

        if components.len() <= 1 {
            return;
        }

        let (main_idx, _) = components
            .iter()
            .enumerate()
            .max_by_key(|(_, m)| m.len())
            .expect("at least one component");

        // Multi-source BFS from the main component over the whole grid gives,
        // for every cell, the nearest main-component cell and its distance.
        let mut dist = vec![i32::MAX; n];
        let mut nearest = vec![0usize; n];
        let mut queue = std::collections::VecDeque::new();
        for &i in &components[main_idx] {
            dist[i] = 0;
            nearest[i] = i;
            queue.push_back(i);
        }
        while let Some(i) = queue.pop_front() {
            let x = (i as i64) % w;
            let y = (i as i64) / w;
            for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let ni = (ny * w + nx) as usize;
                if dist[ni] == i32::MAX {
                    dist[ni] = dist[i] + 1;
                    nearest[ni] = nearest[i];
                    queue.push_back(ni);
                }
            }
        }

        let mut rng = Rng::new(self.seed ^ 0xB81D6E);
        for (label, members) in components.iter().enumerate() {
            if label == main_idx {
                continue;
            }
            // closest cell of this component to the main component
            let closest = *members
                .iter()
                .min_by_key(|&&i| dist[i])
                .expect("component is nonempty");
            let target = nearest[closest];

            let (cx, cy) = (closest as i64 % w, closest as i64 / w);
            let (tx, ty) = (target as i64 % w, target as i64 / w);

            let num_blobs = rng.index(3) + 2; // 2..=4
            for k in 0..num_blobs {
                let t = (k + 1) as f32 / (num_blobs + 1) as f32;
                let jitter = rng.range(-2.0, 2.0);
                let bx = lerp(cx as f32, tx as f32, t) + jitter;
                let by = lerp(cy as f32, ty as f32, t) + jitter;
                let radius = 3.0 + rng.next_f32() * 3.0;
                raise_blob(elevation, w, h, bx, by, radius, sea + 0.05, 0.9);
            }
        }
    }

    /// Flow-accumulation rivers: initializes rainfall, drains each land cell
    /// to its steepest downhill 4-neighbor in descending elevation order, and
    /// thresholds accumulated flow into a river mask.
    fn phase_rivers(&self, elevation: &mut [f32]) -> (Vec<f32>, Vec<bool>) {
        let w = self.width as i64;
        let h = self.height as i64;
        let sea = self.cfg.sea_level;
        let n = elevation.len();

        let mut rng = Rng::new(self.seed ^ 0x21FA0);
        let mut flow = vec![0.0f32; n];
        let mut order: Vec<usize> = (0..n).collect();
        for i in 0..n {
            if elevation[i] >= sea {
                let rain_noise = self.detail.sample(i as f32 * 0.11, (i as f32) * 0.07).unwrap_or(0.0);
                flow[i] = 1.0 + rain_noise * rng.next_f32() + (elevation[i] - 0.4).max(0.0) * 3.0;
            }
        }
        order.sort_by(|&a, &b| elevation[b].partial_cmp(&elevation[a]).unwrap());

        let total: f32 = flow.iter().sum();
        let flow_threshold = (25.0f32).max(total.max(0.0).sqrt() * self.cfg.river_flow_multiplier);

        for &i in &order {
            if elevation[i] < sea {
                continue;
            }
            let x = (i as i64) % w;
            let y = (i as i64) / w;
            let mut steepest: Option<(usize, f32)> = None;
            for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let ni = (ny * w + nx) as usize;
                let drop = elevation[i] - elevation[ni];
                if drop > 0.0 {
                    match steepest {
                        Some((_, best)) if best >= drop => {}
                        _ => steepest = Some((ni, drop)),
                    }
                }
            }
            if let Some((ni, _)) = steepest {
                flow[ni] += flow[i];
            }
        }

        let mut is_river = vec![false; n];
        for i in 0..n {
            if flow[i] >= flow_threshold {
                is_river[i] = true;
            }
        }
        let widen_threshold = flow_threshold * self.cfg.river_widen_multiplier;
        let mut widened = is_river.clone();
        for i in 0..n {
            if flow[i] >= widen_threshold {
                let x = (i as i64) % w;
                let y = (i as i64) / w;
                for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx >= 0 && ny >= 0 && nx < w && ny < h {
                        widened[(ny * w + nx) as usize] = true;
                    }
                }
            }
        }

        (flow, widened)
    }

    fn phase_moisture(&self, elevation: &[f32], river_mask: &[bool]) -> Vec<f32> {
        let w = self.width as i64;
        let h = self.height as i64;
        let n = elevation.len();
        let sea = self.cfg.sea_level;
        let radius = self.cfg.moisture_influence_radius;

        let mut dist = vec![f32::MAX; n];
        let mut queue = std::collections::VecDeque::new();
        for i in 0..n {
            if elevation[i] < sea || river_mask[i] {
                dist[i] = 0.0;
                queue.push_back(i);
            }
        }
        let mut visited = vec![false; n];
        for &i in &queue {
            visited[i] = true;
        }
        while let Some(i) = queue.pop_front() {
            let x = (i as i64) % w;
            let y = (i as i64) / w;
            for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let ni = (ny * w + nx) as usize;
                if !visited[ni] {
                    visited[ni] = true;
                    dist[ni] = dist[i] + 1.0;
                    queue.push_back(ni);
                }
            }
        }

        let mut moisture = vec![0.0f32; n];
        for i in 0..n {
            let mut m = if elevation[i] < sea { 1.0 } else { 0.3 };
            let d = dist[i].min(radius);
            if d < radius {
                m += ((radius - d) / radius) * 0.7;
            }
            moisture[i] = m;
        }

        // rain shadow, row-major west to east
        for y in 0..h {
            let mut shadow = 0.0f32;
            for x in 0..w {
                let i = (y * w + x) as usize;
                if elevation[i] > 0.6 {
                    shadow += (elevation[i] - 0.6) * 0.4;
                }
                shadow *= self.cfg.rain_shadow_decay;
                moisture[i] -= shadow;
                let jitter = self.detail.sample(x as f32 * 0.05, y as f32 * 0.05 + 500.0).unwrap_or(0.0);
                moisture[i] += jitter * 0.05;
                moisture[i] = moisture[i].clamp(0.0, 1.0);
            }
        }

        for _ in 0..self.cfg.moisture_smooth_passes {
            moisture = box_blur(&moisture, self.width, self.height);
        }

        moisture
    }

    fn phase_temperature(&self, elevation: &[f32]) -> Vec<f32> {
        let w = self.width;
        let h = self.height;
        let mut temperature = vec![0.0f32; elevation.len()];
        for y in 0..h {
            for x in 0..w {
                let lat = (y as f32 / h as f32 - 0.5).abs() * 1.25;
                let base = 25.0 * (1.0 - lat.powf(1.5));
                let noise =
                    self.detail.sample(x as f32 * 0.02, y as f32 * 0.02).unwrap_or(0.0) * 4.0
                        + self.detail.sample(x as f32 * 0.1, y as f32 * 0.1 + 1000.0).unwrap_or(0.0) * 1.5;
                let i = (y * w + x) as usize;
                temperature[i] = base + noise - 5.0 * elevation[i];
            }
        }
        temperature
    }

    fn assemble(&self, elevation: Vec<f32>, moisture: Vec<f32>, temperature: Vec<f32>, river_mask: Vec<bool>) -> Map {
        let w = self.width;
        let h = self.height;
        let mut cells = Vec::with_capacity(elevation.len());
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                cells.push(Cell {
                    x,
                    y,
                    elevation: elevation[i],
                    moisture: moisture[i],
                    temperature: temperature[i],
                    biome: Biome::Ocean,
                    is_river: river_mask[i],
                    features: Vec::new(),
                    resources: Vec::new(),
                });
            }
        }
        Map { width: w, height: h, cells }
    }

    fn phase_biome(&self, map: &mut Map) {
        let sea = self.cfg.sea_level;
        let coastal = self.cfg.coastal_level;
        let mountain = self.cfg.mountain_level;

        for cell in map.cells.iter_mut() {
            let jitter = self
                .detail
                .sample(cell.x as f32 * 0.3, cell.y as f32 * 0.3 + 2000.0)
                .unwrap_or(0.0)
                * 0.02;
            let e = cell.elevation + jitter;

            let biome = if e < sea {
                Biome::Ocean
            } else if e < coastal {
                Biome::Coastal
            } else if e >= mountain {
                Biome::Mountain
            } else {
                let temp_factor = smooth_step(0.0, 30.0, cell.temperature);
                let moisture_factor = smooth_step(0.0, 1.0, cell.moisture);
                classify_temperate(temp_factor, moisture_factor)
            };

            cell.biome = if cell.is_river { Biome::River } else { biome };

            let mut features = Vec::new();
            if cell.elevation >= mountain + 0.05 {
                features.push(Feature::Peaks);
            } else if cell.elevation >= mountain {
                features.push(Feature::Cliffs);
            } else if cell.elevation >= coastal + 0.2 && cell.elevation < mountain {
                features.push(Feature::Hills);
            }
            if cell.elevation < coastal + 0.05 && cell.elevation >= sea {
                features.push(Feature::Lowlands);
            }
            if cell.moisture > 0.75 && cell.elevation < coastal + 0.1 && cell.elevation >= sea {
                features.push(Feature::Wetlands);
            }
            if cell.moisture > 0.85 && cell.elevation < sea + 0.05 && cell.elevation >= sea {
                features.push(Feature::Marshes);
            }
            if cell.is_river {
                features.push(Feature::River);
            }
            if cell.moisture > 0.6 && cell.elevation >= coastal && cell.elevation < coastal + 0.25 {
                features.push(Feature::FertileValleys);
            }
            cell.features = features;
        }
    }

    fn phase_resources(&self, map: &mut Map) {
        let mut rng = Rng::new(self.seed ^ 0xC0FFEE);
        for cell in map.cells.iter_mut() {
            let spawn_chance = match cell.biome {
                Biome::Ocean => 0.0,
                Biome::Coastal => 0.08,
                Biome::Mountain => 0.25,
                Biome::Desert => 0.05,
                Biome::River => 0.2,
                _ => 0.12,
            };
            if rng.next_f32() >= spawn_chance {
                continue;
            }
            let mut table: Vec<(Resource, f32)> = match cell.biome {
                Biome::Mountain => vec![(Resource::Stone, 3.0), (Resource::Iron, 2.0), (Resource::Gold, 1.0)],
                Biome::Grassland | Biome::Savanna => vec![(Resource::Food, 3.0), (Resource::Horses, 1.0)],
                Biome::Forest | Biome::Woodland | Biome::TropicalForest | Biome::Rainforest | Biome::Taiga => {
                    vec![(Resource::Wood, 3.0), (Resource::Food, 1.0)]
                }
                Biome::River | Biome::Coastal => vec![(Resource::Food, 3.0), (Resource::Stone, 1.0)],
                Biome::Desert | Biome::Tundra => vec![(Resource::Stone, 2.0), (Resource::Gold, 1.0)],
                Biome::Ocean => Vec::new(),
            };
            if cell.elevation > 0.7 {
                for (resource, weight) in table.iter_mut() {
                    if matches!(resource, Resource::Iron | Resource::Gold) {
                        *weight *= 1.5;
                    }
                }
            }
            if let Some(pick) = weighted_pick(&mut rng, &table) {
                cell.resources.push(pick);
            }
        }
    }

    fn phase_smooth(&self, map: &mut Map) {
        let w = self.width as i64;
        let h = self.height as i64;
        let predicate = |c: &Cell| c.biome != Biome::Coastal && (0.35..=0.7).contains(&c.elevation);

        let mut next: Vec<f32> = map.cells.iter().map(|c| c.elevation).collect();
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                if !predicate(&map.cells[i]) {
                    continue;
                }
                let mut sum = 0.0f32;
                let mut count = 0.0f32;
                let mut all_match = true;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let ni = (ny * w + nx) as usize;
                        if !predicate(&map.cells[ni]) {
                            all_match = false;
                        }
                        sum += map.cells[ni].elevation;
                        count += 1.0;
                    }
                }
                if all_match {
                    next[i] = sum / count;
                }
            }
        }
        for (cell, e) in map.cells.iter_mut().zip(next) {
            cell.elevation = e;
        }
    }
}

fn classify_temperate(temp_factor: f32, moisture_factor: f32) -> Biome {
    match (temp_factor >= 0.5, moisture_factor >= 0.5) {
        (true, true) if temp_factor >= 0.8 && moisture_factor >= 0.8 => Biome::Rainforest,
        (true, true) => Biome::TropicalForest,
        (true, false) if temp_factor >= 0.8 => Biome::Desert,
        (true, false) => Biome::Savanna,
        (false, false) if temp_factor < 0.2 => Biome::Tundra,
        (false, false) => Biome::Taiga,
        (false, true) if moisture_factor >= 0.75 => Biome::Forest,
        (false, true) if moisture_factor >= 0.6 => Biome::Woodland,
        (false, true) => Biome::Grassland,
    }
}

fn weighted_pick(rng: &mut Rng, table: &[(Resource, f32)]) -> Option<Resource> {
    let total: f32 = table.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.next_f32() * total;
    for (resource, weight) in table {
        if roll < *weight {
            return Some(*resource);
        }
        roll -= weight;
    }
    table.last().map(|(r, _)| *r)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t.clamp(0.0, 1.0) * (b - a)
}

fn raise_blob(elevation: &mut [f32], w: i64, h: i64, cx: f32, cy: f32, radius: f32, target_floor: f32, cap: f32) {
    let min_x = ((cx - radius).floor() as i64).max(0);
    let max_x = ((cx + radius).ceil() as i64).min(w - 1);
    let min_y = ((cy - radius).floor() as i64).max(0);
    let max_y = ((cy + radius).ceil() as i64).min(h - 1);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d > radius {
                continue;
            }
            let falloff = 1.0 - d / radius;
            let i = (y * w + x) as usize;
            let lifted = target_floor + falloff * 0.1;
            elevation[i] = elevation[i].max(lifted).min(cap);
        }
    }
}

fn box_blur(values: &[f32], width: u32, height: u32) -> Vec<f32> {
    let w = width as i64;
    let h = height as i64;
    let mut out = vec![0.0f32; values.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0f32;
            let mut count = 0.0f32;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    sum += values[(ny * w + nx) as usize];
                    count += 1.0;
                }
            }
            out[(y * w + x) as usize] = sum / count;
        }
    }
    out
}
