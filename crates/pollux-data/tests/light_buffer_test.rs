use pollux_core::renderer::GraphicsDevice;
use pollux_core::testing::{RecordedCommand, RecordingDevice};
use pollux_data::light_buffer::LightBuffer;
use pollux_data::scene::{CpuUpdater, Light, LightCategory, LightId, LightType};
use pollux_core::math::LinearRgba;
use std::sync::Arc;

const DIRECTIONAL: u64 = 64;
const POINT: u64 = 48;
const SPOT: u64 = 80;

struct Fixture {
    device: RecordingDevice,
    buffer: LightBuffer,
    next_id: u64,
}

impl Fixture {
    fn new(capacity: u32) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = RecordingDevice::new();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let buffer = LightBuffer::new(shared, capacity).unwrap();
        Self {
            device,
            buffer,
            next_id: 0,
        }
    }

    fn light(&mut self, category: LightCategory) -> Arc<Light> {
        self.next_id += 1;
        let name = format!("light{}", self.next_id);
        Arc::new(Light::new(LightId(self.next_id), name, "test", category))
    }

    fn update(&self) -> usize {
        self.buffer.update(&CpuUpdater::default()).unwrap()
    }

    fn staging_writes(&self) -> usize {
        let staging = self.device.buffer_by_label("LightBuffer/staging").unwrap();
        self.device
            .writes()
            .iter()
            .filter(|(id, _, _)| *id == staging)
            .count()
    }

    /// Checks every tracked light against the partition formula and the staged bytes.
    fn assert_layout(&self) {
        let staging = self.device.buffer_by_label("LightBuffer/staging").unwrap();
        let contents = self.device.buffer_contents(staging).unwrap();
        let mut base = 0;
        for light_type in LightType::ALL {
            let lights = self.buffer.lights(light_type);
            let partition = self.buffer.partition(light_type);
            assert_eq!(partition.base_offset, base);
            assert_eq!(partition.count as usize, lights.len());
            assert_eq!(partition.stride, light_type.stride());
            for (index, light) in lights.iter().enumerate() {
                let expected = base + index as u64 * light_type.stride();
                assert_eq!(
                    self.buffer.offset_of(light.id()),
                    Some(expected),
                    "{} #{index}",
                    light_type.name()
                );
                let start = expected as usize;
                let end = start + light_type.stride() as usize;
                assert_eq!(&contents[start..end], light.record().as_slice());
            }
            base += lights.len() as u64 * light_type.stride();
        }
    }
}

fn point() -> LightCategory {
    LightCategory::Point { range: 10.0 }
}

fn spot() -> LightCategory {
    LightCategory::Spot {
        range: 10.0,
        inner_angle: 0.3,
        outer_angle: 0.5,
    }
}

#[test]
fn strides_match_the_record_layouts() {
    assert_eq!(LightType::Directional.stride(), DIRECTIONAL);
    assert_eq!(LightType::Point.stride(), POINT);
    assert_eq!(LightType::Spot.stride(), SPOT);
}

#[test]
fn point_light_lands_after_the_directional_run() {
    let mut fx = Fixture::new(8);
    let sun = fx.light(LightCategory::Directional);
    let moon = fx.light(LightCategory::Directional);
    fx.buffer.add_light(&sun);
    fx.buffer.add_light(&moon);
    fx.update();

    let lamp = fx.light(point());
    assert!(fx.buffer.add_light(&lamp));
    assert!(fx.buffer.is_dirty(lamp.id()));
    assert_eq!(fx.buffer.offset_of(lamp.id()), None);

    fx.update();
    assert_eq!(fx.buffer.offset_of(lamp.id()), Some(2 * DIRECTIONAL));
    assert_eq!(fx.buffer.offset_of(moon.id()), Some(DIRECTIONAL));
    fx.assert_layout();
}

#[test]
fn removing_the_first_light_shifts_its_run_down() {
    let mut fx = Fixture::new(8);
    let sun = fx.light(LightCategory::Directional);
    let spots: Vec<_> = (0..3).map(|_| fx.light(spot())).collect();
    fx.buffer.add_light(&sun);
    for light in &spots {
        fx.buffer.add_light(light);
    }
    fx.update();
    let before: Vec<_> = spots
        .iter()
        .map(|l| fx.buffer.offset_of(l.id()).unwrap())
        .collect();
    let sun_before = fx.buffer.offset_of(sun.id());

    assert!(fx.buffer.remove_light(&spots[0]));
    assert!(!fx.buffer.is_dirty(sun.id()));
    fx.update();

    assert_eq!(fx.buffer.offset_of(spots[0].id()), None);
    assert_eq!(fx.buffer.offset_of(spots[1].id()), Some(before[1] - SPOT));
    assert_eq!(fx.buffer.offset_of(spots[2].id()), Some(before[2] - SPOT));
    assert_eq!(fx.buffer.offset_of(sun.id()), sun_before);
    fx.assert_layout();
}

#[test]
fn point_removal_cascades_into_spots() {
    let mut fx = Fixture::new(8);
    let lamp = fx.light(point());
    let torch = fx.light(spot());
    fx.buffer.add_light(&lamp);
    fx.buffer.add_light(&torch);
    fx.update();
    assert_eq!(fx.buffer.offset_of(torch.id()), Some(POINT));

    fx.buffer.remove_light(&lamp);
    assert!(fx.buffer.is_dirty(torch.id()));
    fx.update();
    assert_eq!(fx.buffer.offset_of(torch.id()), Some(0));
}

#[test]
fn offsets_follow_the_partition_formula_after_any_sequence() {
    let mut fx = Fixture::new(16);
    let mut live: Vec<Arc<Light>> = Vec::new();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for step in 0..200 {
        let roll = next();
        if live.is_empty() || roll % 3 != 0 {
            let category = match roll % 5 {
                0 | 1 => LightCategory::Directional,
                2 | 3 => point(),
                _ => spot(),
            };
            let light = fx.light(category);
            if fx.buffer.add_light(&light) {
                live.push(light);
            }
        } else {
            let index = (roll as usize / 3) % live.len();
            let light = live.swap_remove(index);
            assert!(fx.buffer.remove_light(&light));
        }
        if step % 7 == 0 {
            fx.update();
            fx.assert_layout();
        }
    }
    fx.update();
    fx.assert_layout();
    assert_eq!(fx.buffer.len(), live.len());
}

#[test]
fn a_light_changed_many_times_is_written_once() {
    let mut fx = Fixture::new(8);
    let lamp = fx.light(point());
    fx.buffer.add_light(&lamp);
    // Added and changed before the first update.
    lamp.set_intensity(2.0);
    lamp.set_intensity(3.0);
    assert_eq!(fx.update(), 1);

    fx.device.clear_writes();
    for k in 0..5 {
        lamp.set_intensity(4.0 + k as f32);
    }
    lamp.set_colour(LinearRgba::rgb(1.0, 0.5, 0.25));
    lamp.notify_gpu_changed();
    assert_eq!(fx.update(), 1);
    assert_eq!(fx.staging_writes(), 1);
    fx.assert_layout();

    fx.device.clear_writes();
    assert_eq!(fx.update(), 0);
    assert_eq!(fx.staging_writes(), 0);
}

#[test]
fn unchanged_values_do_not_dirty_the_light() {
    let mut fx = Fixture::new(8);
    let lamp = fx.light(point());
    fx.buffer.add_light(&lamp);
    fx.update();
    lamp.set_intensity(lamp.intensity());
    assert_eq!(fx.update(), 0);
}

#[test]
fn adding_twice_or_past_capacity_is_refused() {
    let mut fx = Fixture::new(2);
    let a = fx.light(point());
    let b = fx.light(point());
    let c = fx.light(point());
    assert!(fx.buffer.add_light(&a));
    assert!(!fx.buffer.add_light(&a));
    assert!(fx.buffer.add_light(&b));
    assert!(!fx.buffer.add_light(&c));
    assert_eq!(fx.buffer.count(LightType::Point), 2);
    // Other types keep their own room.
    let sun = fx.light(LightCategory::Directional);
    assert!(fx.buffer.add_light(&sun));
}

#[test]
fn refused_lights_take_the_first_free_slot() {
    let mut fx = Fixture::new(1);
    let a = fx.light(point());
    let b = fx.light(point());
    let c = fx.light(point());
    assert!(fx.buffer.add_light(&a));
    assert!(!fx.buffer.add_light(&b));
    assert!(!fx.buffer.add_light(&c));
    assert!(!fx.buffer.add_light(&b));
    assert_eq!(fx.buffer.waiting_count(LightType::Point), 2);
    fx.update();
    assert_eq!(fx.buffer.index_of(b.id()), None);

    assert!(fx.buffer.remove_light(&a));
    assert_eq!(fx.buffer.index_of(b.id()), Some((LightType::Point, 0)));
    assert!(fx.buffer.is_dirty(b.id()));
    assert_eq!(fx.buffer.waiting_count(LightType::Point), 1);
    assert_eq!(fx.update(), 1);
    assert_eq!(fx.buffer.offset_of(b.id()), Some(0));
    fx.assert_layout();

    // A waiting light can be withdrawn before it gets a slot.
    assert!(fx.buffer.remove_light(&c));
    assert_eq!(fx.buffer.waiting_count(LightType::Point), 0);
    assert!(!fx.buffer.remove_light(&c));
}

#[test]
fn waiting_lights_fill_slots_freed_by_dropped_lights() {
    let mut fx = Fixture::new(1);
    let first = fx.light(point());
    let second = fx.light(point());
    let gone = fx.light(point());
    fx.buffer.add_light(&first);
    fx.buffer.add_light(&gone);
    fx.buffer.add_light(&second);
    fx.update();
    drop(gone);
    drop(first);
    fx.update();
    assert_eq!(fx.buffer.waiting_count(LightType::Point), 0);
    assert_eq!(fx.buffer.offset_of(second.id()), Some(0));
}

#[test]
fn dropped_lights_are_pruned_on_update() {
    let mut fx = Fixture::new(8);
    let first = fx.light(point());
    let second = fx.light(point());
    fx.buffer.add_light(&first);
    fx.buffer.add_light(&second);
    fx.update();
    drop(first);
    fx.update();
    assert_eq!(fx.buffer.count(LightType::Point), 1);
    assert_eq!(fx.buffer.offset_of(second.id()), Some(0));
}

#[test]
fn upload_copies_the_written_range_once() {
    let mut fx = Fixture::new(4);
    let sun = fx.light(LightCategory::Directional);
    let lamp = fx.light(point());
    fx.buffer.add_light(&sun);
    fx.buffer.add_light(&lamp);

    let mut encoder = fx.device.create_command_encoder(Some("frame"));
    assert!(!fx.buffer.upload(encoder.as_mut()));
    fx.update();
    assert!(fx.buffer.is_awaiting_upload());
    assert!(fx.buffer.upload(encoder.as_mut()));
    assert!(!fx.buffer.upload(encoder.as_mut()));
    let command_buffer = encoder.finish();
    fx.device.submit_command_buffer(command_buffer);

    let staging = fx.device.buffer_by_label("LightBuffer/staging").unwrap();
    let gpu = fx.buffer.gpu_buffer();
    assert_eq!(
        fx.device.commands(command_buffer),
        vec![RecordedCommand::CopyBufferToBuffer {
            source: staging,
            source_offset: 0,
            destination: gpu,
            destination_offset: 0,
            size: DIRECTIONAL + POINT,
        }]
    );
    let uploaded = fx.device.buffer_contents(gpu).unwrap();
    let points = DIRECTIONAL as usize..(DIRECTIONAL + POINT) as usize;
    assert_eq!(&uploaded[points], lamp.record().as_slice());
}

#[test]
fn buffers_are_released_on_drop() {
    let fx = Fixture::new(4);
    assert_eq!(fx.device.buffer_count(), 2);
    let device = fx.device.clone();
    drop(fx);
    assert_eq!(device.buffer_count(), 0);
}

#[test]
fn allocation_failure_is_reported() {
    let device = RecordingDevice::new();
    device.set_memory_limit(Some(16));
    let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    assert!(LightBuffer::new(shared, 4).is_err());
    assert_eq!(device.buffer_count(), 0);
}
