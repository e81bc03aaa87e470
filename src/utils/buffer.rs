/// Copy the given planar buffer into an interleaved one.
/// The planar buffer's layout defines layout of the interleaved buffer (channel and frame count).
pub fn planar_to_interleaved(planar: &[Vec<f32>], interleaved: &mut [f32]) {
    let channel_count = planar.len();
    match channel_count {
        1 => {
            for (i, p) in interleaved.iter_mut().zip(planar[0].iter()) {
                *i = *p;
            }
        }
        2 => {
            for (frame, (l, r)) in interleaved
                .chunks_exact_mut(2)
                .zip(planar[0].iter().zip(planar[1].iter()))
            {
                frame[0] = *l;
                frame[1] = *r;
            }
        }
        _ => {
            for (channel_index, channel_values) in planar.iter().enumerate() {
                for (frame, value) in interleaved
                    .chunks_exact_mut(channel_count)
                    .zip(channel_values.iter())
                {
                    frame[channel_index] = *value;
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Copy the given interleaved buffer into a planar one.
/// The planar buffer's layout defines layout of the interleaved buffer (channel and frame count).
pub fn interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channel_count = planar.len();
    match channel_count {
        1 => {
            for (p, i) in planar[0].iter_mut().zip(interleaved) {
                *p = *i;
            }
        }
        _ => {
            for (channel_index, channel_values) in planar.iter_mut().enumerate() {
                for (value, frame) in channel_values
                    .iter_mut()
                    .zip(interleaved.chunks_exact(channel_count))
                {
                    *value = frame[channel_index];
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Change the channel layout of an interleaved buffer, appending the result to `output`.
///
/// Mono inputs are copied into the first two output channels, multi channel inputs are
/// down-mixed to mono by averaging or copy their first two channels. Any remaining output
/// channels are silent.
pub fn map_channels(
    input: &[f32],
    input_channels: usize,
    output: &mut Vec<f32>,
    output_channels: usize,
) {
    debug_assert!(input_channels > 0 && output_channels > 0);
    debug_assert!(input.len() % input_channels == 0);

    let frame_count = input.len() / input_channels;
    output.reserve(frame_count * output_channels);

    if input_channels == output_channels {
        output.extend_from_slice(input);
        return;
    }
    for frame in input.chunks_exact(input_channels) {
        match (input_channels, output_channels) {
            (_, 1) => {
                let sum = frame.iter().sum::<f32>();
                output.push(sum / input_channels as f32);
            }
            (1, c) => {
                output.push(frame[0]);
                output.push(frame[0]);
                output.extend(std::iter::repeat_n(0.0, c - 2));
            }
            (_, c) => {
                output.push(frame[0]);
                output.push(frame[1]);
                output.extend(std::iter::repeat_n(0.0, c - 2));
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    #[test]
    fn planar_interleaved() {
        // mono
        let planar_mono = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let interleaved_mono = vec![1.0, 2.0, 3.0, 4.0];
        let mut planar_mono_copy = planar_mono.clone();
        let mut interleaved_mono_copy = interleaved_mono.clone();

        planar_to_interleaved(&planar_mono, &mut interleaved_mono_copy);
        interleaved_to_planar(&interleaved_mono, &mut planar_mono_copy);
        assert_eq!(planar_mono, planar_mono_copy);
        assert_eq!(interleaved_mono, interleaved_mono_copy);

        // stereo
        let planar_stereo = vec![vec![1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0]];
        let interleaved_stereo = vec![1.0, 4.0, 2.0, 3.0, 3.0, 2.0, 4.0, 1.0];
        let mut planar_stereo_copy = vec![vec![0.0; 4]; 2];
        let mut interleaved_stereo_copy = vec![0.0; 8];

        planar_to_interleaved(&planar_stereo, &mut interleaved_stereo_copy);
        interleaved_to_planar(&interleaved_stereo, &mut planar_stereo_copy);
        assert_eq!(planar_stereo, planar_stereo_copy);
        assert_eq!(interleaved_stereo, interleaved_stereo_copy);

        // general
        let planar_general = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![4.0, 3.0, 2.0, 1.0],
            vec![2.0, 1.0, 4.0, 3.0],
        ];
        let interleaved_general = vec![1.0, 4.0, 2.0, 2.0, 3.0, 1.0, 3.0, 2.0, 4.0, 4.0, 1.0, 3.0];
        let mut planar_general_copy = vec![vec![0.0; 4]; 3];
        let mut interleaved_general_copy = vec![0.0; 12];
        planar_to_interleaved(&planar_general, &mut interleaved_general_copy);
        interleaved_to_planar(&interleaved_general, &mut planar_general_copy);
        assert_eq!(planar_general, planar_general_copy);
        assert_eq!(interleaved_general, interleaved_general_copy);
    }

    #[test]
    fn channel_mapping() {
        let mut output = Vec::new();
        map_channels(&[1.0, 2.0], 1, &mut output, 2);
        assert_eq!(output, vec![1.0, 1.0, 2.0, 2.0]);

        output.clear();
        map_channels(&[1.0, 3.0, 2.0, 4.0], 2, &mut output, 1);
        assert_eq!(output, vec![2.0, 3.0]);

        output.clear();
        map_channels(&[1.0, 2.0, 3.0], 3, &mut output, 4);
        assert_eq!(output, vec![1.0, 2.0, 0.0, 0.0]);

        output.clear();
        map_channels(&[1.0, 2.0], 2, &mut output, 2);
        assert_eq!(output, vec![1.0, 2.0]);
    }
}
