//! Terrain decoder tests

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use room_frames::{CellCoord, FrameError, TerrainDecoder, CELL_COUNT, ROOM_SIZE};

    const PLAIN: u8 = 213;
    const WALL: u8 = 192;
    const SWAMP: u8 = 216;

    fn expected_color(code: char) -> u8 {
        match code {
            '0' => PLAIN,
            '1' | '3' => WALL,
            '2' => SWAMP,
            _ => unreachable!(),
        }
    }

    // -----------------------------------------------------------------------
    // Valid terrain
    // -----------------------------------------------------------------------

    #[test]
    fn all_plain_terrain() {
        let terrain = TerrainDecoder::default()
            .decode(&"0".repeat(CELL_COUNT))
            .unwrap();
        assert_eq!(terrain.as_slice().len(), CELL_COUNT);
        assert!(terrain.as_slice().iter().all(|&c| c == PLAIN));
    }

    #[test]
    fn cells_are_indexed_x_plus_y_times_width() {
        let mut raw = vec!['0'; CELL_COUNT];
        raw[7 + 3 * ROOM_SIZE] = '2';
        let raw: String = raw.into_iter().collect();
        let terrain = TerrainDecoder::default().decode(&raw).unwrap();
        assert_eq!(terrain.at(CellCoord::new(7, 3)), SWAMP);
        assert_eq!(terrain.at(CellCoord::new(3, 7)), PLAIN);
    }

    proptest! {
        #[test]
        fn digits_map_to_terrain_colors(codes in proptest::collection::vec(
            prop::sample::select(vec!['0', '1', '2', '3']),
            CELL_COUNT,
        )) {
            let raw: String = codes.iter().collect();
            let terrain = TerrainDecoder::default().decode(&raw).unwrap();
            prop_assert_eq!(terrain.as_slice().len(), CELL_COUNT);
            for (cell, code) in terrain.as_slice().iter().zip(&codes) {
                prop_assert_eq!(*cell, expected_color(*code));
            }
        }

        // -------------------------------------------------------------------
        // Invalid terrain
        // -------------------------------------------------------------------

        #[test]
        fn wrong_length_is_malformed(len in 0usize..3000) {
            prop_assume!(len != CELL_COUNT);
            let result = TerrainDecoder::default().decode(&"0".repeat(len));
            let is_malformed = matches!(
                result,
                Err(FrameError::MalformedTerrain { expected: CELL_COUNT, actual }) if actual == len
            );
            prop_assert!(is_malformed);
        }

        #[test]
        fn appended_characters_are_malformed(tail in "[0-3 \n\r\t]{1,8}") {
            let raw = format!("{}{}", "0".repeat(CELL_COUNT), tail);
            let expected_len = CELL_COUNT + tail.chars().count();
            let result = TerrainDecoder::default().decode(&raw);
            let is_malformed = matches!(
                result,
                Err(FrameError::MalformedTerrain { expected: CELL_COUNT, actual }) if actual == expected_len
            );
            prop_assert!(is_malformed);
        }

        #[test]
        fn unknown_digits_are_rejected(index in 0usize..CELL_COUNT, code in "[4-9a-zA-Z]") {
            let code = code.chars().next().unwrap();
            let mut raw = vec!['1'; CELL_COUNT];
            raw[index] = code;
            let raw: String = raw.into_iter().collect();
            let result = TerrainDecoder::default().decode(&raw);
            let is_unknown = matches!(
                result,
                Err(FrameError::UnknownTerrainCode { index: i, code: c }) if i == index && c == code
            );
            prop_assert!(is_unknown);
        }
    }
}
